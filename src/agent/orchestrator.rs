//! Generate/validate loop
//!
//! The orchestrator owns one request at a time per call: it seeds an
//! [`AgentContext`] from the session history, alternates generator and
//! validator, and persists the user message with the final code once the
//! loop reaches a terminal state.

use super::generator::CodeGenerator;
use super::validator::CodeValidator;
use super::{Agent, AgentContext, AgentResponse, HistoryEntry};
use crate::config::Config;
use crate::error::{DslsmithError, Result};
use crate::library::DslLibrary;
use crate::prompts::generation::FEEDBACK_PREFIX;
use crate::providers::Provider;
use crate::storage::{Role, SessionStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One user request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    /// Natural-language request
    pub message: String,
    /// Target language identifier
    pub language: String,
    /// Existing session; a fresh id is generated when absent or blank
    pub session_id: Option<String>,
}

impl AskRequest {
    /// Request without a session id
    pub fn new(message: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            language: language.into(),
            session_id: None,
        }
    }

    /// Attach a session id
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Generating,
    Validating,
    Succeeded,
    Exhausted,
}

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The validator accepted the code
    Validated,
    /// Iterations ran out; `code` is the last candidate
    Exhausted,
    /// The generator failed; nothing was persisted
    GenerationFailed,
}

/// Result of [`Orchestrator::run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOutcome {
    pub session_id: String,
    pub language: String,
    pub status: OutcomeStatus,
    /// Final candidate; empty when generation failed
    pub code: String,
    /// Generator invocations made
    pub iterations: usize,
    /// Latest non-passing validator verdict
    pub feedback: Option<String>,
    /// Generator error when `status` is `GenerationFailed`
    pub error: Option<String>,
}

impl AskOutcome {
    /// Text returned to callers of [`Orchestrator::ask`]
    pub fn response_text(&self) -> String {
        match self.status {
            OutcomeStatus::GenerationFailed => format!(
                "Code generation failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
            OutcomeStatus::Validated | OutcomeStatus::Exhausted => self.code.clone(),
        }
    }

    /// True when the validator accepted the code
    pub fn is_validated(&self) -> bool {
        self.status == OutcomeStatus::Validated
    }
}

/// Drives generator and validator until the code passes or the budget ends
pub struct Orchestrator {
    generator: Arc<dyn Agent>,
    validator: Arc<dyn Agent>,
    sessions: Arc<dyn SessionStore>,
    max_iterations: usize,
    timeout: Duration,
    history_window: usize,
}

impl Orchestrator {
    /// Create an orchestrator with default limits
    pub fn new(
        generator: Arc<dyn Agent>,
        validator: Arc<dyn Agent>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            generator,
            validator,
            sessions,
            max_iterations: 6,
            timeout: Duration::from_secs(300),
            history_window: 10,
        }
    }

    /// Build both agents and the loop from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an LLM-backed agent is selected
    /// and `provider` is `None`
    pub fn from_config(
        config: &Config,
        provider: Option<Arc<dyn Provider>>,
        library: Arc<dyn DslLibrary>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let generator = CodeGenerator::from_config(&config.agents, provider.clone(), library.clone())?;
        let validator = CodeValidator::from_config(&config.agents, provider, library)?;

        Ok(Self::new(Arc::new(generator), Arc::new(validator), sessions)
            .with_max_iterations(config.orchestrator.max_iterations)
            .with_timeout(Duration::from_secs(config.orchestrator.timeout_seconds))
            .with_history_window(config.sessions.history_window))
    }

    /// Generate/validate pairs allowed per request (at least one)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Wall-clock budget per request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stored messages loaded into each new context
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Answer `user_message` with code, always as text
    ///
    /// Returns the final code, `"Code generation failed: ..."` when the
    /// generator fails, or `"Error: ..."` for anything unexpected. An empty
    /// `session_id` starts a new session.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use dslsmith::agent::Orchestrator;
    /// use dslsmith::config::{Config, GeneratorKind};
    /// use dslsmith::library::FileLibrary;
    /// use dslsmith::storage::InMemorySessionStore;
    ///
    /// let mut config = Config::default();
    /// config.agents.generator_kind = GeneratorKind::Template;
    /// let orchestrator = Orchestrator::from_config(
    ///     &config,
    ///     None,
    ///     Arc::new(FileLibrary::builtin()),
    ///     Arc::new(InMemorySessionStore::new(3600)),
    /// )?;
    ///
    /// # tokio_test::block_on(async {
    /// let code = orchestrator.ask("Create a program", "classroom", "").await;
    /// assert!(code.contains("action main"));
    /// # });
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub async fn ask(&self, user_message: &str, language: &str, session_id: &str) -> String {
        let request = AskRequest::new(user_message, language).with_session(session_id);
        match self.run(request, CancellationToken::new()).await {
            Ok(outcome) => outcome.response_text(),
            Err(e) => {
                error!("Error processing request: {:#}", e);
                format!("Error: {}", e)
            }
        }
    }

    /// Run the loop for one request
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` or `Timeout` when the request is aborted, and
    /// propagates session store failures. An aborted request leaves the
    /// session log untouched.
    pub async fn run(&self, request: AskRequest, cancel: CancellationToken) -> Result<AskOutcome> {
        if cancel.is_cancelled() {
            return Err(DslsmithError::Cancelled.into());
        }
        let deadline = deadline_after(self.timeout);

        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.sessions
            .get_or_create(&session_id, Some(request.language.as_str()))?;
        let history = self.sessions.history(&session_id, self.history_window)?;

        info!(
            "Processing request for session {} (language={}, history={})",
            session_id,
            request.language,
            history.len()
        );

        let mut context = AgentContext::new(
            session_id.clone(),
            request.language.clone(),
            request.message.clone(),
            self.max_iterations,
        )
        .with_history(history.iter().map(HistoryEntry::from).collect());

        let mut state = LoopState::Generating;
        let mut iteration = 0;
        let mut candidate = String::new();
        let mut feedback = None;

        while !matches!(state, LoopState::Succeeded | LoopState::Exhausted) {
            match state {
                LoopState::Generating => {
                    iteration += 1;
                    debug!("Iteration {}/{}: generating", iteration, self.max_iterations);

                    let response = self
                        .guarded(self.generator.as_ref(), &context, &cancel, deadline)
                        .await?;
                    if !response.success {
                        let error = response
                            .error_message
                            .unwrap_or_else(|| "unknown error".to_string());
                        warn!("Code generation failed on iteration {}: {}", iteration, error);
                        return Ok(AskOutcome {
                            session_id,
                            language: request.language,
                            status: OutcomeStatus::GenerationFailed,
                            code: String::new(),
                            iterations: iteration,
                            feedback,
                            error: Some(error),
                        });
                    }

                    candidate = response.content;
                    context.push_turn(Role::Assistant, candidate.clone());
                    state = LoopState::Validating;
                }
                LoopState::Validating => {
                    debug!("Iteration {}/{}: validating", iteration, self.max_iterations);

                    let verdict = self
                        .guarded(self.validator.as_ref(), &context, &cancel, deadline)
                        .await?;
                    if verdict.code_is_valid() {
                        state = LoopState::Succeeded;
                        continue;
                    }

                    if !verdict.content.is_empty() {
                        debug!("Validator feedback: {}", verdict.content);
                        context.push_turn(
                            Role::System,
                            format!("{}{}", FEEDBACK_PREFIX, verdict.content),
                        );
                        feedback = Some(verdict.content);
                    }

                    state = if iteration >= self.max_iterations {
                        LoopState::Exhausted
                    } else {
                        LoopState::Generating
                    };
                }
                LoopState::Succeeded | LoopState::Exhausted => {}
            }
        }

        self.sessions.append_all(
            &session_id,
            vec![
                (Role::User, request.message),
                (Role::Assistant, candidate.clone()),
            ],
        )?;

        let status = if state == LoopState::Succeeded {
            info!("Code validated after {} iteration(s)", iteration);
            OutcomeStatus::Validated
        } else {
            warn!(
                "Maximum iterations ({}) reached without valid code",
                self.max_iterations
            );
            OutcomeStatus::Exhausted
        };

        Ok(AskOutcome {
            session_id,
            language: request.language,
            status,
            code: candidate,
            iterations: iteration,
            feedback,
            error: None,
        })
    }

    /// Run one agent, racing cancellation and the request deadline
    async fn guarded(
        &self,
        agent: &dyn Agent,
        context: &AgentContext,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<AgentResponse> {
        if cancel.is_cancelled() {
            return Err(DslsmithError::Cancelled.into());
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Request cancelled while {} was running", agent.name());
                Err(DslsmithError::Cancelled.into())
            }
            result = tokio::time::timeout_at(deadline, agent.run(context)) => match result {
                Ok(response) => Ok(response),
                Err(_) => {
                    warn!("Request timed out while {} was running", agent.name());
                    Err(DslsmithError::Timeout(self.timeout.as_secs()).into())
                }
            },
        }
    }
}

// Budgets past what the clock can represent run without a deadline.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::heuristics::SUCCESS_SENTINEL;
    use crate::storage::{InMemorySessionStore, SEED_SYSTEM_MESSAGE};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Agent replaying canned responses; repeats the last one when exhausted
    struct CannedAgent {
        name: String,
        replies: Mutex<VecDeque<AgentResponse>>,
        seen: Mutex<Vec<AgentContext>>,
        delay: Option<Duration>,
    }

    impl CannedAgent {
        fn new(name: &str, replies: Vec<AgentResponse>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                replies: Mutex::new(VecDeque::from(vec![AgentResponse::ok(name, "late")])),
                seen: Mutex::new(Vec::new()),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn contexts(&self) -> Vec<AgentContext> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Agent for CannedAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, context: &AgentContext) -> AgentResponse {
            self.seen.lock().unwrap().push(context.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        }
    }

    fn candidates(n: usize) -> Vec<AgentResponse> {
        (1..=n)
            .map(|i| AgentResponse::ok("gen", format!("candidate {}", i)))
            .collect()
    }

    fn rejecting() -> Arc<CannedAgent> {
        CannedAgent::new(
            "val",
            vec![AgentResponse::ok("val", "Validation failed: Mismatched braces")],
        )
    }

    fn store() -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::new(3600))
    }

    #[tokio::test]
    async fn test_first_candidate_accepted() {
        let generator = CannedAgent::new("gen", candidates(1));
        let validator = CannedAgent::new("val", vec![AgentResponse::ok("val", SUCCESS_SENTINEL)]);
        let sessions = store();
        let orchestrator = Orchestrator::new(generator.clone(), validator.clone(), sessions.clone());

        let outcome = orchestrator
            .run(AskRequest::new("make it", "classroom").with_session("s1"), CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.is_validated());
        assert_eq!(outcome.code, "candidate 1");
        assert_eq!(outcome.iterations, 1);
        assert_eq!((generator.calls(), validator.calls()), (1, 1));

        let history = sessions.history("s1", 10).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, SEED_SYSTEM_MESSAGE);
        assert_eq!((history[1].role, history[1].content.as_str()), (Role::User, "make it"));
        assert_eq!(
            (history[2].role, history[2].content.as_str()),
            (Role::Assistant, "candidate 1")
        );
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_candidate() {
        let generator = CannedAgent::new("gen", candidates(3));
        let validator = rejecting();
        let sessions = store();
        let orchestrator = Orchestrator::new(generator.clone(), validator.clone(), sessions.clone())
            .with_max_iterations(3);

        let outcome = orchestrator
            .run(AskRequest::new("make it", "classroom").with_session("s1"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Exhausted);
        assert_eq!(outcome.code, "candidate 3");
        assert_eq!(outcome.iterations, 3);
        assert_eq!(
            outcome.feedback.as_deref(),
            Some("Validation failed: Mismatched braces")
        );
        assert_eq!((generator.calls(), validator.calls()), (3, 3));

        // Only the request and the final answer are stored.
        let history = sessions.history("s1", 10).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].content, "candidate 3");
    }

    #[tokio::test]
    async fn test_feedback_reaches_next_generation() {
        let generator = CannedAgent::new("gen", candidates(2));
        let validator = CannedAgent::new(
            "val",
            vec![
                AgentResponse::ok("val", "Missing 'action main'"),
                AgentResponse::ok("val", SUCCESS_SENTINEL),
            ],
        );
        let orchestrator = Orchestrator::new(generator.clone(), validator.clone(), store());

        let outcome = orchestrator
            .run(AskRequest::new("make it", "classroom"), CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_validated());
        assert_eq!(outcome.code, "candidate 2");
        assert_eq!(outcome.iterations, 2);

        let second = &generator.contexts()[1];
        let turns = second.chat_history();
        let n = turns.len();
        assert_eq!(turns[n - 2], HistoryEntry::new(Role::Assistant, "candidate 1"));
        assert_eq!(
            turns[n - 1],
            HistoryEntry::new(Role::System, "Validation feedback: Missing 'action main'")
        );
        assert_eq!(validator.contexts()[1].last_assistant(), Some("candidate 2"));
    }

    #[tokio::test]
    async fn test_empty_feedback_is_not_appended() {
        let generator = CannedAgent::new("gen", candidates(2));
        let validator = CannedAgent::new("val", vec![AgentResponse::ok("val", "")]);
        let orchestrator =
            Orchestrator::new(generator.clone(), validator, store()).with_max_iterations(2);

        let outcome = orchestrator
            .run(AskRequest::new("x", "classroom"), CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.feedback.is_none());
        assert!(generator.contexts()[1]
            .chat_history()
            .iter()
            .all(|turn| !turn.content.starts_with(FEEDBACK_PREFIX)));
    }

    #[tokio::test]
    async fn test_generator_failure_aborts_without_appends() {
        let generator = CannedAgent::new("gen", vec![AgentResponse::failed("gen", "boom")]);
        let validator = rejecting();
        let sessions = store();
        let orchestrator = Orchestrator::new(generator, validator.clone(), sessions.clone());

        let text = orchestrator.ask("make it", "classroom", "s1").await;
        assert_eq!(text, "Code generation failed: boom");
        assert_eq!(validator.calls(), 0);
        assert_eq!(sessions.history("s1", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_session_id_gets_uuid() {
        let generator = CannedAgent::new("gen", candidates(1));
        let validator = CannedAgent::new("val", vec![AgentResponse::ok("val", SUCCESS_SENTINEL)]);
        let orchestrator = Orchestrator::new(generator, validator, store());

        let outcome = orchestrator
            .run(AskRequest::new("x", "csharp").with_session("  "), CancellationToken::new())
            .await
            .unwrap();
        assert!(Uuid::parse_str(&outcome.session_id).is_ok());
        assert_eq!(orchestrator.sessions().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stored_turns_seed_the_next_request() {
        let generator = CannedAgent::new("gen", candidates(2));
        let validator = CannedAgent::new("val", vec![AgentResponse::ok("val", SUCCESS_SENTINEL)]);
        let orchestrator = Orchestrator::new(generator.clone(), validator, store());

        orchestrator.ask("first", "classroom", "s1").await;
        orchestrator.ask("second", "classroom", "s1").await;

        let second = &generator.contexts()[1];
        let roles: Vec<Role> = second.chat_history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(second.user_message, "second");
    }

    #[tokio::test]
    async fn test_cancelled_request_leaves_store_untouched() {
        let generator = CannedAgent::new("gen", candidates(1));
        let validator = rejecting();
        let sessions = store();
        let orchestrator = Orchestrator::new(generator.clone(), validator, sessions.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = orchestrator
            .run(AskRequest::new("x", "classroom").with_session("s1"), cancel)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DslsmithError>(),
            Some(DslsmithError::Cancelled)
        ));
        assert_eq!(generator.calls(), 0);
        assert_eq!(sessions.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_agent_call() {
        let generator = CannedAgent::slow("gen", Duration::from_secs(30));
        let sessions = store();
        let orchestrator = Orchestrator::new(generator, rejecting(), sessions.clone());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = orchestrator
            .run(AskRequest::new("x", "classroom").with_session("s1"), cancel)
            .await;
        assert!(result.is_err());
        assert_eq!(sessions.history("s1", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_aborts_request() {
        let generator = CannedAgent::slow("gen", Duration::from_secs(30));
        let orchestrator = Orchestrator::new(generator, rejecting(), store())
            .with_timeout(Duration::from_millis(20));

        let text = orchestrator.ask("x", "classroom", "s1").await;
        assert!(text.starts_with("Error: Request timed out"));
    }

    #[tokio::test]
    async fn test_unbounded_timeout_still_runs() {
        let generator = CannedAgent::new("gen", candidates(1));
        let validator = CannedAgent::new("val", vec![AgentResponse::ok("val", SUCCESS_SENTINEL)]);
        let orchestrator = Orchestrator::new(generator, validator, store())
            .with_timeout(Duration::from_secs(u64::MAX));

        let outcome = orchestrator
            .run(AskRequest::new("make it", "classroom"), CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_validated());
        assert_eq!(outcome.code, "candidate 1");
    }

    #[test]
    fn test_response_text() {
        let outcome = AskOutcome {
            session_id: "s".into(),
            language: "classroom".into(),
            status: OutcomeStatus::Exhausted,
            code: "program P { }".into(),
            iterations: 6,
            feedback: None,
            error: None,
        };
        assert_eq!(outcome.response_text(), "program P { }");
        assert!(!outcome.is_validated());
    }

    #[test]
    fn test_max_iterations_floor() {
        let orchestrator = Orchestrator::new(
            CannedAgent::new("gen", candidates(1)),
            rejecting(),
            store(),
        )
        .with_max_iterations(0);
        assert_eq!(orchestrator.max_iterations(), 1);
    }
}
