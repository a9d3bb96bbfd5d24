//! dslsmith - DSL code generation CLI
//!
#![doc = "dslsmith - DSL code generation CLI"]
#![doc = "Main entry point for the dslsmith application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dslsmith::cli::{Cli, Commands};
use dslsmith::commands;
use dslsmith::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing once the log level and format are known
    init_tracing(&config.logging);

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Ask {
            language,
            session,
            json,
            message,
        } => {
            let message = message.join(" ");
            tracing::debug!("Asking for {} code: {}", language, message);
            commands::ask::run_ask(config, language, session, message, json).await?;
            Ok(())
        }
        Commands::Chat { language, session } => {
            if let Some(s) = &session {
                tracing::debug!("Resuming session: {}", s);
            }
            commands::chat::run_chat(config, language, session).await?;
            Ok(())
        }
        Commands::Serve { host, port } => {
            commands::serve::run_serve(config, host, port).await?;
            Ok(())
        }
        Commands::Validate { language, file } => {
            commands::validate::run_validate(&language, &file)?;
            Ok(())
        }
        Commands::Languages => {
            commands::languages::run_languages(&config)?;
            Ok(())
        }
        Commands::Init { dir } => {
            tracing::info!("Seeding defaults into {}", dir.display());
            commands::init::run_init(&dir)?;
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dslsmith={}", logging.level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
