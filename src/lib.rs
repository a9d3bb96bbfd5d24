//! dslsmith - LLM-backed DSL code generation library
//!
//! This library turns natural-language requests into code for small
//! domain-specific languages. A generator agent proposes code, a validator
//! agent checks it, and an orchestrator loops between the two until the
//! code passes or the iteration budget is spent.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Generator and validator agents and the orchestration loop
//! - `library`: Few-shot examples and grammars per language
//! - `storage`: Chat session store
//! - `providers`: LLM provider abstraction and implementations (OpenAI-compatible, Ollama)
//! - `prompts`: Agent instructions and prompt builders
//! - `server`: HTTP API
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use dslsmith::{commands, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let runtime = commands::build_runtime(&config)?;
//!     let code = runtime
//!         .orchestrator
//!         .ask("Create a program with a main action", "classroom", "")
//!         .await;
//!     println!("{}", code);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod library;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use agent::{Agent, AgentContext, AgentResponse, AskOutcome, AskRequest, Orchestrator};
pub use config::Config;
pub use error::{DslsmithError, Result};
pub use library::{DslLibrary, FileLibrary};
pub use storage::{InMemorySessionStore, SessionStore};

#[cfg(test)]
pub mod test_utils;
