//! Code validator agent
//!
//! Checks the newest assistant turn of the context. A passing check puts
//! [`SUCCESS_SENTINEL`] in the response content; a failing check still
//! reports `success == true` and carries the diagnostics as content.

use super::heuristics::{extract_code, failure_summary, validate_code, SUCCESS_SENTINEL};
use super::{Agent, AgentContext, AgentResponse};
use crate::config::{AgentConfig, AgentsConfig, ValidatorKind};
use crate::error::{DslsmithError, Result};
use crate::library::DslLibrary;
use crate::prompts::build_review_prompt;
use crate::providers::{CompletionOptions, Message, Provider};
use async_trait::async_trait;
use std::sync::Arc;

/// Error message when the context holds no candidate code
pub const NO_CODE_FOUND: &str = "no code found";

/// How candidate code is checked
#[derive(Clone)]
pub enum ValidatorBackend {
    /// Language-keyed structural and delimiter checks
    Heuristic,
    /// Ask an LLM provider to review the code
    Llm(Arc<dyn Provider>),
}

/// Agent judging candidate code
pub struct CodeValidator {
    profile: AgentConfig,
    backend: ValidatorBackend,
    library: Arc<dyn DslLibrary>,
}

impl CodeValidator {
    /// Create a validator
    pub fn new(
        profile: AgentConfig,
        backend: ValidatorBackend,
        library: Arc<dyn DslLibrary>,
    ) -> Self {
        Self {
            profile,
            backend,
            library,
        }
    }

    /// Build the validator selected by `agents.validator_kind`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the LLM backend is selected but
    /// no provider is supplied
    pub fn from_config(
        agents: &AgentsConfig,
        provider: Option<Arc<dyn Provider>>,
        library: Arc<dyn DslLibrary>,
    ) -> Result<Self> {
        let backend = match agents.validator_kind {
            ValidatorKind::Heuristic => ValidatorBackend::Heuristic,
            ValidatorKind::Llm => ValidatorBackend::Llm(provider.ok_or_else(|| {
                DslsmithError::Config("llm validator requires a provider".to_string())
            })?),
        };
        Ok(Self::new(agents.validator.clone(), backend, library))
    }

    fn no_code(&self) -> AgentResponse {
        let mut response = AgentResponse::failed(self.name(), NO_CODE_FOUND);
        response.content = "No code found to validate".to_string();
        response
    }

    fn check_heuristically(&self, context: &AgentContext, code: &str) -> AgentResponse {
        let errors = validate_code(&context.language, code);
        if errors.is_empty() {
            tracing::debug!("Code passed heuristic checks for {}", context.language);
            return AgentResponse::ok(self.name(), SUCCESS_SENTINEL);
        }

        let summary = failure_summary(&errors);
        tracing::debug!("{}", summary);
        AgentResponse::ok(self.name(), summary.clone())
            .with_error_message(summary)
            .with_metadata("error_count", errors.len().to_string())
    }

    async fn review(
        &self,
        provider: &dyn Provider,
        context: &AgentContext,
        code: &str,
    ) -> Result<AgentResponse> {
        let mut review_context = context.clone();
        if review_context.grammar.is_none() {
            review_context.grammar = self.library.grammar_for(&context.language)?;
        }

        let mut messages = vec![Message::system(self.profile.instructions.clone())];
        messages.extend(context.chat_history().iter().map(|turn| turn.to_message()));
        messages.push(Message::user(build_review_prompt(&review_context, code)));

        let options = CompletionOptions {
            model: self.profile.model.clone(),
            temperature: Some(self.profile.temperature),
            max_tokens: self.profile.max_tokens,
        };
        let completion = provider.complete(&messages, &options).await?;
        let verdict = completion.message.content;
        let tokens = completion.usage.map(|u| u.total_tokens);

        let response = AgentResponse::ok(self.name(), verdict.clone()).with_tokens(tokens);
        if response.code_is_valid() {
            Ok(response)
        } else {
            Ok(response.with_error_message(verdict))
        }
    }
}

#[async_trait]
impl Agent for CodeValidator {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn execute(&self, context: &AgentContext) -> AgentResponse {
        let Some(content) = context.last_assistant() else {
            return self.no_code();
        };
        let code = extract_code(content);
        if code.is_empty() {
            return self.no_code();
        }

        match &self.backend {
            ValidatorBackend::Heuristic => self.check_heuristically(context, &code),
            ValidatorBackend::Llm(provider) => {
                match self.review(provider.as_ref(), context, &code).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!("Error validating code: {:#}", e);
                        let mut response = AgentResponse::failed(self.name(), e.to_string());
                        response.content = format!("Validation could not run: {}", e);
                        response
                    }
                }
            }
        }
    }
}
