/*!
Command handlers for the CLI

Each subcommand of the `dslsmith` binary has a handler here. Handlers build
their collaborators through [`build_runtime`] so every entry point wires the
provider, library, session store and orchestrator the same way.
*/

use crate::agent::Orchestrator;
use crate::config::{Config, GeneratorKind, ValidatorKind};
use crate::error::Result;
use crate::library::{DslLibrary, FileLibrary};
use crate::providers::{create_provider, Provider};
use crate::storage::{InMemorySessionStore, SessionStore};
use std::sync::Arc;

// Interactive chat REPL
pub mod chat;

// Seeding of config, examples and grammars
pub mod init;

// Language listing
pub mod languages;

/// Collaborators shared by the command handlers
pub struct Runtime {
    pub orchestrator: Arc<Orchestrator>,
    pub library: Arc<dyn DslLibrary>,
}

/// Whether either agent talks to an LLM
pub fn needs_provider(config: &Config) -> bool {
    config.agents.generator_kind == GeneratorKind::Llm
        || config.agents.validator_kind == ValidatorKind::Llm
}

/// Wire library, session store, provider and orchestrator from `config`
///
/// The provider is only created when an agent needs it, so template and
/// heuristic runs work offline.
pub fn build_runtime(config: &Config) -> Result<Runtime> {
    let library: Arc<dyn DslLibrary> = Arc::new(FileLibrary::from_config(&config.library)?);
    let sessions: Arc<dyn SessionStore> =
        Arc::new(InMemorySessionStore::new(config.sessions.timeout_seconds));

    let provider: Option<Arc<dyn Provider>> = if needs_provider(config) {
        let provider = create_provider(&config.provider)?;
        tracing::info!(
            "Using {} provider with model {}",
            config.provider.provider_type,
            provider.current_model()
        );
        Some(Arc::from(provider))
    } else {
        tracing::debug!("No agent needs an LLM provider");
        None
    };

    let orchestrator = Orchestrator::from_config(config, provider, library.clone(), sessions)?;
    Ok(Runtime {
        orchestrator: Arc::new(orchestrator),
        library,
    })
}

// One-shot generation
pub mod ask {
    //! `dslsmith ask`: run the loop once and print the answer.

    use super::*;
    use crate::agent::{AskRequest, OutcomeStatus};
    use colored::Colorize;
    use tokio_util::sync::CancellationToken;

    /// Answer a single request
    ///
    /// Ctrl-C cancels the request; nothing is stored in that case. With
    /// `json` the full outcome is printed instead of the bare code.
    pub async fn run_ask(
        config: Config,
        language: String,
        session: Option<String>,
        message: String,
        json: bool,
    ) -> Result<()> {
        let runtime = build_runtime(&config)?;

        let mut request = AskRequest::new(message, language);
        if let Some(session_id) = session {
            request = request.with_session(session_id);
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });
        let result = runtime.orchestrator.run(request, cancel).await;
        watcher.abort();
        let outcome = result?;

        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome.status {
            OutcomeStatus::Validated => println!("{}", outcome.code),
            OutcomeStatus::Exhausted => {
                println!("{}", outcome.code);
                eprintln!(
                    "{}",
                    format!(
                        "Warning: code did not pass validation after {} iterations",
                        outcome.iterations
                    )
                    .yellow()
                );
            }
            OutcomeStatus::GenerationFailed => {
                return Err(anyhow::anyhow!(outcome.response_text()));
            }
        }
        Ok(())
    }
}

// HTTP server
pub mod serve {
    //! `dslsmith serve`: expose the HTTP API.

    use super::*;
    use crate::server::{self, AppState};
    use std::time::Duration;

    /// Serve until Ctrl-C; `host`/`port` override the configured address
    pub async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
        tracing::info!("Starting HTTP server");
        let runtime = build_runtime(&config)?;
        let host = host.unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);

        let state = AppState::new(runtime.orchestrator, runtime.library);
        server::serve(
            state,
            &host,
            port,
            Duration::from_secs(config.sessions.cleanup_interval_seconds),
        )
        .await
    }
}

// Offline validation of a file
pub mod validate {
    //! `dslsmith validate`: run the heuristic checks on a file.

    use crate::agent::heuristics::{extract_code, validate_code};
    use crate::error::{DslsmithError, Result};
    use anyhow::Context;
    use colored::Colorize;
    use std::path::Path;

    /// Check `file` as `language` code; fails when any check fails
    pub fn run_validate(language: &str, file: &Path) -> Result<()> {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let errors = validate_code(language, &extract_code(&content));

        if errors.is_empty() {
            println!(
                "{}",
                format!("{} is valid {} code", file.display(), language).green()
            );
            return Ok(());
        }

        println!("{}", format!("{}:", file.display()).bold());
        for error in &errors {
            println!("  {} {}", "-".red(), error);
        }
        Err(DslsmithError::Validation(errors.join("; ")).into())
    }

}
