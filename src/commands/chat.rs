//! Interactive chat mode handler.
//!
//! Runs a readline loop bound to one session: every line is a request to
//! the orchestrator, and the stored conversation carries over between turns.

use super::build_runtime;
use crate::agent::{AskOutcome, AskRequest, OutcomeStatus};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{ChatMessage, Role};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Slash commands understood by the REPL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    History,
    Exit,
    Unknown(String),
    /// Plain text sent to the orchestrator
    Request(String),
}

impl ChatCommand {
    /// Classify one input line
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "/help" | "/?" => Self::Help,
            "/history" => Self::History,
            "/exit" | "/quit" | "exit" | "quit" => Self::Exit,
            other if other.starts_with('/') => Self::Unknown(trimmed.to_string()),
            _ => Self::Request(trimmed.to_string()),
        }
    }
}

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Global configuration
/// * `language` - Target language for every request
/// * `session` - Session to resume; a new one is started when `None`
pub async fn run_chat(config: Config, language: String, session: Option<String>) -> Result<()> {
    tracing::info!("Starting interactive chat mode");

    let runtime = build_runtime(&config)?;
    let session_id = session
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut rl = DefaultEditor::new()?;
    print_welcome_banner(&language, &session_id);

    let prompt = format!("{}> ", language).cyan().to_string();
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.trim())?;

                match ChatCommand::parse(&line) {
                    ChatCommand::Exit => break,
                    ChatCommand::Help => print_help(),
                    ChatCommand::History => {
                        let messages = runtime
                            .orchestrator
                            .sessions()
                            .history(&session_id, usize::MAX)?;
                        print_history(&messages);
                    }
                    ChatCommand::Unknown(command) => {
                        println!("{}", format!("Unknown command: {} (try /help)", command).yellow());
                    }
                    ChatCommand::Request(text) => {
                        let request = AskRequest::new(text, language.clone())
                            .with_session(session_id.clone());
                        match runtime
                            .orchestrator
                            .run(request, CancellationToken::new())
                            .await
                        {
                            Ok(outcome) => print_outcome(&outcome),
                            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Session {} ended", session_id);
    Ok(())
}

fn print_welcome_banner(language: &str, session_id: &str) {
    println!("{}", "dslsmith interactive chat".bold());
    println!("Language: {}", language.green());
    println!("Session:  {}", session_id.cyan());
    println!("Type /help for commands, /exit to quit\n");
}

fn print_help() {
    println!(
        r#"
Chat Commands
=============
  /history  - Show the stored conversation of this session
  /help     - Show this help
  /exit     - Leave chat mode (also /quit, exit, quit)

Anything else is sent as a code generation request.
"#
    );
}

fn print_outcome(outcome: &AskOutcome) {
    match outcome.status {
        OutcomeStatus::Validated => {
            println!("\n{}\n", outcome.code);
            println!(
                "{}",
                format!("Validated after {} iteration(s)", outcome.iterations).green()
            );
        }
        OutcomeStatus::Exhausted => {
            println!("\n{}\n", outcome.code);
            println!(
                "{}",
                format!(
                    "Not validated after {} iterations: {}",
                    outcome.iterations,
                    outcome.feedback.as_deref().unwrap_or("no feedback")
                )
                .yellow()
            );
        }
        OutcomeStatus::GenerationFailed => {
            println!("{}", outcome.response_text().red());
        }
    }
}

fn print_history(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("No messages yet");
        return;
    }
    for message in messages {
        let label = match message.role {
            Role::System => "system".dimmed(),
            Role::User => "user".green(),
            Role::Assistant => "assistant".cyan(),
        };
        println!(
            "[{}] {}: {}",
            message.timestamp.format("%H:%M:%S"),
            label,
            message.content
        );
    }
}
