//! Command-line interface definition for dslsmith
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for one-shot generation, interactive chat,
//! the HTTP server, offline validation, and seeding default data.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dslsmith - generate validated DSL code from natural language
#[derive(Parser, Debug, Clone)]
#[command(name = "dslsmith")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the provider from config (openai, ollama)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for dslsmith
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate code for a single request
    Ask {
        /// Target DSL
        #[arg(short, long, default_value = "classroom")]
        language: String,

        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Print the structured outcome as JSON
        #[arg(long)]
        json: bool,

        /// Natural-language request
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Start an interactive generation session
    Chat {
        /// Target DSL
        #[arg(short, long, default_value = "classroom")]
        language: String,

        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Serve the HTTP API
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check a source file with the heuristic validator
    Validate {
        /// Language of the file
        #[arg(short, long, default_value = "classroom")]
        language: String,

        /// File to check
        file: PathBuf,
    },

    /// List known languages with example and grammar counts
    Languages,

    /// Write default config, examples and grammars (existing files are kept)
    Init {
        /// Directory to initialize
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            provider: None,
            command: Commands::Languages,
        }
    }
}
