//! Provider module for dslsmith
//!
//! This module contains the LLM provider abstraction and implementations
//! for OpenAI-compatible endpoints (OpenRouter) and Ollama.

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{CompletionOptions, CompletionResponse, Message, Provider, TokenUsage};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::{DslsmithError, Result};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration; `provider_type` selects the backend
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config.openai.clone())?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        other => Err(DslsmithError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}
