//! Configuration management for dslsmith
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{DslsmithError, Result};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Upper bound accepted for `orchestrator.max_iterations`
pub const MAX_ITERATIONS_LIMIT: usize = 50;

/// Main configuration structure for dslsmith
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Generator and validator agent settings
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Generate/validate loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Chat session store settings
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Example and grammar locations
    #[serde(default)]
    pub library: LibraryConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider configuration
///
/// Specifies which AI provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// OpenAI-compatible chat completions configuration (OpenRouter by default)
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_provider_type() -> String {
    "openai".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Model to request
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Bearer token. Usually supplied through `OPENROUTER_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_openai_api_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openai_model() -> String {
    "mistralai/mistral-7b-instruct".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            model: default_openai_model(),
            api_key: None,
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// How candidate code is produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Ask the configured LLM provider
    #[default]
    Llm,
    /// Emit a deterministic placeholder program for the language
    Template,
}

/// How candidate code is checked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    /// Language-keyed structural and delimiter checks
    #[default]
    Heuristic,
    /// Ask the configured LLM provider to review the code
    Llm,
}

/// Static identity of one agent
///
/// Loaded once with the rest of the configuration and never mutated
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Agent name, reported in every response
    pub name: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
    /// Instructions placed at the top of every prompt
    #[serde(default)]
    pub instructions: String,
    /// Model override; the provider's configured model is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion length limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tool names the agent may use
    #[serde(default)]
    pub tools: Vec<String>,
    /// Free-form annotations
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl AgentConfig {
    /// Default profile of the code generator agent
    pub fn generator() -> Self {
        Self {
            name: "code-generator".to_string(),
            description: "Generates code that conforms to a DSL grammar".to_string(),
            instructions: prompts::GENERATOR_INSTRUCTIONS.to_string(),
            model: None,
            temperature: 0.7,
            max_tokens: None,
            tools: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Default profile of the code validator agent
    pub fn validator() -> Self {
        Self {
            name: "code-validator".to_string(),
            description: "Validates generated code against the DSL rules".to_string(),
            instructions: prompts::VALIDATOR_INSTRUCTIONS.to_string(),
            model: None,
            temperature: 0.3,
            max_tokens: None,
            tools: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Agent selection and profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Generator backend
    #[serde(default)]
    pub generator_kind: GeneratorKind,

    /// Validator backend
    #[serde(default)]
    pub validator_kind: ValidatorKind,

    /// Examples included in a generation prompt
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,

    /// Generator profile
    #[serde(default = "AgentConfig::generator")]
    pub generator: AgentConfig,

    /// Validator profile
    #[serde(default = "AgentConfig::validator")]
    pub validator: AgentConfig,
}

fn default_max_examples() -> usize {
    5
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            generator_kind: GeneratorKind::default(),
            validator_kind: ValidatorKind::default(),
            max_examples: default_max_examples(),
            generator: AgentConfig::generator(),
            validator: AgentConfig::validator(),
        }
    }
}

/// Generate/validate loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Generate/validate pairs attempted before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock budget of one request in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_max_iterations() -> usize {
    6
}

fn default_timeout() -> u64 {
    300
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_seconds: default_timeout(),
        }
    }
}

/// Session store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,

    /// Messages of prior history included in a new context
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Period of the background reaper used by `serve`
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_session_timeout() -> u64 {
    3600
}

fn default_history_window() -> usize {
    10
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_session_timeout(),
            history_window: default_history_window(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Example and grammar locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory of `<language>.yaml` example files
    #[serde(default = "default_examples_dir")]
    pub examples_dir: PathBuf,

    /// Directory of `<Language>.g4` grammar files
    #[serde(default = "default_grammars_dir")]
    pub grammars_dir: PathBuf,
}

fn default_examples_dir() -> PathBuf {
    PathBuf::from("data/examples")
}

fn default_grammars_dir() -> PathBuf {
    PathBuf::from("data/grammars")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            examples_dir: default_examples_dir(),
            grammars_dir: default_grammars_dir(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level for the `dslsmith` target when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DslsmithError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| DslsmithError::Config(format!("Failed to parse config: {}", e)).into())
    }

    /// Render the configuration as YAML
    ///
    /// Used by `init` to write a starting config file.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn apply_env_vars(&mut self) {
        // Provider overrides
        if let Ok(provider_type) = std::env::var("DSLSMITH_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(api_base) = std::env::var("DSLSMITH_OPENAI_API_BASE") {
            self.provider.openai.api_base = api_base;
        }

        if let Ok(model) = std::env::var("DSLSMITH_OPENAI_MODEL") {
            self.provider.openai.model = model;
        }

        if let Ok(key) = std::env::var("DSLSMITH_OPENAI_API_KEY") {
            self.provider.openai.api_key = Some(key);
        } else if self.provider.openai.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
                self.provider.openai.api_key = Some(key);
            }
        }

        if let Ok(ollama_host) = std::env::var("DSLSMITH_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("DSLSMITH_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }

        // Loop overrides
        if let Ok(max_iterations) = std::env::var("DSLSMITH_MAX_ITERATIONS") {
            if let Ok(value) = max_iterations.parse() {
                self.orchestrator.max_iterations = value;
            } else {
                tracing::warn!("Invalid DSLSMITH_MAX_ITERATIONS: {}", max_iterations);
            }
        }

        if let Ok(timeout) = std::env::var("DSLSMITH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.orchestrator.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid DSLSMITH_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("DSLSMITH_SESSION_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.sessions.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid DSLSMITH_SESSION_TIMEOUT: {}", timeout);
            }
        }

        // Library overrides
        if let Ok(dir) = std::env::var("DSLSMITH_EXAMPLES_DIR") {
            self.library.examples_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("DSLSMITH_GRAMMARS_DIR") {
            self.library.grammars_dir = PathBuf::from(dir);
        }

        // Server overrides
        if let Ok(port) = std::env::var("DSLSMITH_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid DSLSMITH_PORT: {}", port);
            }
        }

        if let Ok(json) = std::env::var("DSLSMITH_LOG_JSON") {
            self.logging.json_format = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(provider) = &cli.provider {
            tracing::debug!("Using provider override: {}", provider);
            self.provider.provider_type = provider.clone();
        }

        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(DslsmithError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["openai", "ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(DslsmithError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.orchestrator.max_iterations == 0 {
            return Err(DslsmithError::Config(
                "max_iterations must be greater than 0".to_string(),
            )
            .into());
        }

        if self.orchestrator.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(DslsmithError::Config(format!(
                "max_iterations must be less than or equal to {}",
                MAX_ITERATIONS_LIMIT
            ))
            .into());
        }

        if self.orchestrator.timeout_seconds == 0 {
            return Err(
                DslsmithError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.sessions.history_window == 0 {
            return Err(DslsmithError::Config(
                "sessions.history_window must be greater than 0".to_string(),
            )
            .into());
        }

        if self.sessions.cleanup_interval_seconds == 0 {
            return Err(DslsmithError::Config(
                "sessions.cleanup_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        for agent in [&self.agents.generator, &self.agents.validator] {
            if agent.name.trim().is_empty() {
                return Err(
                    DslsmithError::Config("agent name cannot be empty".to_string()).into(),
                );
            }
            if !(0.0..=2.0).contains(&agent.temperature) {
                return Err(DslsmithError::Config(format!(
                    "agent '{}' temperature must be between 0.0 and 2.0",
                    agent.name
                ))
                .into());
            }
        }

        if self.server.port == 0 {
            return Err(
                DslsmithError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            agents: AgentsConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            sessions: SessionConfig::default(),
            library: LibraryConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.provider_type, "openai");
        assert_eq!(config.orchestrator.max_iterations, 6);
        assert_eq!(config.sessions.timeout_seconds, 3600);
        assert_eq!(config.sessions.history_window, 10);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.agents.generator.name, "code-generator");
        assert_eq!(config.agents.validator.temperature, 0.3);
    }

    #[test]
    fn test_config_validation_success() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_provider() {
        let mut config = Config::default();
        config.provider.provider_type = "bogus".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid provider type"));
    }

    #[test]
    fn test_config_validation_zero_iterations() {
        let mut config = Config::default();
        config.orchestrator.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_iterations_too_large() {
        let mut config = Config::default();
        config.orchestrator.max_iterations = MAX_ITERATIONS_LIMIT + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_temperature_range() {
        let mut config = Config::default();
        config.agents.generator.temperature = 2.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_config_validation_zero_history_window() {
        let mut config = Config::default();
        config.sessions.history_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_yaml_fills_defaults() {
        let yaml = r#"
provider:
  type: ollama
  ollama:
    host: http://ollama:11434
agents:
  generator_kind: template
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.provider_type, "ollama");
        assert_eq!(config.provider.ollama.host, "http://ollama:11434");
        assert_eq!(config.provider.ollama.model, "llama3.2:latest");
        assert_eq!(config.agents.generator_kind, GeneratorKind::Template);
        assert_eq!(config.agents.validator_kind, ValidatorKind::Heuristic);
        assert_eq!(config.agents.generator, AgentConfig::generator());
        assert_eq!(config.orchestrator.max_iterations, 6);
    }

    #[test]
    fn test_yaml_round_trip_keeps_agent_profiles() {
        let mut config = Config::default();
        config.agents.validator.max_tokens = Some(256);
        let yaml = config.to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.agents.validator, config.agents.validator);
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/dslsmith.yaml", &Cli::default()).unwrap();
        assert_eq!(config.orchestrator.max_iterations, 6);
    }

    #[test]
    #[serial]
    fn test_env_overrides_applied() {
        std::env::set_var("DSLSMITH_MAX_ITERATIONS", "3");
        std::env::set_var("DSLSMITH_OLLAMA_MODEL", "qwen2.5-coder");
        std::env::set_var("DSLSMITH_PORT", "not-a-port");
        let config = Config::load("/nonexistent/dslsmith.yaml", &Cli::default()).unwrap();
        std::env::remove_var("DSLSMITH_MAX_ITERATIONS");
        std::env::remove_var("DSLSMITH_OLLAMA_MODEL");
        std::env::remove_var("DSLSMITH_PORT");

        assert_eq!(config.orchestrator.max_iterations, 3);
        assert_eq!(config.provider.ollama.model, "qwen2.5-coder");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    #[serial]
    fn test_openrouter_key_fallback() {
        std::env::remove_var("DSLSMITH_OPENAI_API_KEY");
        std::env::set_var("OPENROUTER_API_KEY", "sk-or-test");
        let config = Config::load("/nonexistent/dslsmith.yaml", &Cli::default()).unwrap();
        std::env::remove_var("OPENROUTER_API_KEY");
        assert_eq!(config.provider.openai.api_key.as_deref(), Some("sk-or-test"));
    }

    #[test]
    #[serial]
    fn test_cli_provider_override() {
        let cli = Cli {
            provider: Some("ollama".to_string()),
            verbose: true,
            ..Cli::default()
        };
        let config = Config::load("/nonexistent/dslsmith.yaml", &cli).unwrap();
        assert_eq!(config.provider.provider_type, "ollama");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_validation_zero_cleanup_interval() {
        let mut config = Config::default();
        config.sessions.cleanup_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_file_is_valid() {
        let config: Config = serde_yaml::from_str(include_str!("../config/config.yaml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.agents.generator, AgentConfig::generator());
        assert_eq!(config.agents.validator, AgentConfig::validator());
    }
}
