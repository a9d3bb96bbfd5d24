//! Ollama provider implementation for dslsmith
//!
//! This module implements the Provider trait for Ollama, connecting to a local
//! or remote Ollama server through its non-streaming `/api/chat` endpoint.

use crate::config::OllamaConfig;
use crate::error::{DslsmithError, Result};
use crate::providers::{CompletionOptions, CompletionResponse, Message, Provider, TokenUsage};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Ollama API provider
///
/// # Examples
///
/// ```no_run
/// use dslsmith::config::OllamaConfig;
/// use dslsmith::providers::{CompletionOptions, Message, OllamaProvider, Provider};
///
/// # async fn example() -> dslsmith::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let messages = vec![Message::user("Write a Classroom program")];
/// let completion = provider.complete(&messages, &CompletionOptions::default()).await?;
/// println!("{}", completion.message.content);
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: Arc<RwLock<OllamaConfig>>,
}

/// Response from Ollama's /api/tags endpoint
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelTag>,
}

/// Model entry from /api/tags
#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}

/// Request structure for Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

/// Sampling options in Ollama format
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Message structure for Ollama API
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// Response structure from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("dslsmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DslsmithError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> String {
        self.config
            .read()
            .map(|config| config.host.clone())
            .unwrap_or_default()
    }

    fn convert_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn convert_options(options: &CompletionOptions) -> Option<OllamaOptions> {
        if options.temperature.is_none() && options.max_tokens.is_none() {
            return None;
        }
        Some(OllamaOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        let (url, default_model) = {
            let config = self.config.read().map_err(|_| {
                DslsmithError::Provider("Failed to acquire read lock on config".to_string())
            })?;
            (format!("{}/api/chat", config.host), config.model.clone())
        };

        let ollama_request = OllamaRequest {
            model: options.model.clone().unwrap_or(default_model),
            messages: Self::convert_messages(messages),
            stream: false,
            options: Self::convert_options(options),
        };

        tracing::debug!(
            "Sending Ollama request: model={}, {} messages",
            ollama_request.model,
            ollama_request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                DslsmithError::Provider(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(DslsmithError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            DslsmithError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.prompt_eval_count,
            ollama_response.eval_count
        );

        let message = Message::assistant(ollama_response.message.content);
        let response = if ollama_response.prompt_eval_count > 0 || ollama_response.eval_count > 0
        {
            let usage = TokenUsage::new(
                ollama_response.prompt_eval_count,
                ollama_response.eval_count,
            );
            CompletionResponse::with_usage(message, usage)
        } else {
            CompletionResponse::new(message)
        };

        Ok(response)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.host());
        tracing::debug!("Fetching models from Ollama: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!("Failed to fetch Ollama models: {}", e);
            DslsmithError::Provider(format!("Failed to connect to Ollama server: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(DslsmithError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            DslsmithError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn current_model(&self) -> String {
        self.config
            .read()
            .map(|config| config.model.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OllamaConfig {
        OllamaConfig {
            host: "http://localhost:11434".to_string(),
            model: "llama3.2:latest".to_string(),
        }
    }

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new(test_config()).unwrap();
        assert_eq!(provider.host(), "http://localhost:11434");
        assert_eq!(provider.current_model(), "llama3.2:latest");
    }

    #[test]
    fn test_convert_messages_preserves_order() {
        let messages = vec![
            Message::system("rules"),
            Message::user("Hello"),
            Message::assistant("Hi there"),
        ];
        let converted = OllamaProvider::convert_messages(&messages);
        let roles: Vec<&str> = converted.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[test]
    fn test_convert_options_omitted_when_empty() {
        assert!(OllamaProvider::convert_options(&CompletionOptions::default()).is_none());

        let options = CompletionOptions {
            model: None,
            temperature: Some(0.3),
            max_tokens: Some(200),
        };
        let json = serde_json::to_value(OllamaProvider::convert_options(&options)).unwrap();
        assert_eq!(json["num_predict"], 200);
    }

    #[test]
    fn test_request_serialization_is_non_streaming() {
        let request = OllamaRequest {
            model: "m".to_string(),
            messages: vec![],
            stream: false,
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("options").is_none());
    }
}
