//! Agents and the generate/validate loop
//!
//! The generator and validator both implement [`Agent`]: they take an
//! [`AgentContext`] and return an [`AgentResponse`] without ever failing.
//! The [`Orchestrator`] alternates between them until the code passes or the
//! iteration budget runs out.

pub mod context;
pub mod generator;
pub mod heuristics;
pub mod orchestrator;
pub mod response;
pub mod validator;

pub use context::{AgentContext, HistoryEntry};
pub use generator::{CodeGenerator, GeneratorBackend};
pub use orchestrator::{AskOutcome, AskRequest, LoopState, Orchestrator, OutcomeStatus};
pub use response::AgentResponse;
pub use validator::{CodeValidator, ValidatorBackend};

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, warn};

/// A unit of work in the loop
///
/// Implementations convert their own errors into a response with
/// `success == false`; nothing propagates to the caller.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name used in logs and responses
    fn name(&self) -> &str;

    /// Process the context once
    async fn execute(&self, context: &AgentContext) -> AgentResponse;

    /// [`Agent::execute`] with wall-clock timing recorded on the response
    async fn run(&self, context: &AgentContext) -> AgentResponse {
        let started = Instant::now();
        let mut response = self.execute(context).await;
        let elapsed = started.elapsed();
        response.processing_time = Some(elapsed);

        if response.success {
            debug!("Agent {} finished in {:?}", self.name(), elapsed);
        } else {
            warn!(
                "Agent {} failed after {:?}: {}",
                self.name(),
                elapsed,
                response.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        response
    }
}
