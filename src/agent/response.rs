//! Output of one agent invocation

use super::heuristics::SUCCESS_SENTINEL;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of running an agent once
///
/// `success == false` always carries an `error_message`. For the validator,
/// `success` only says the check ran; whether the code passed is signalled
/// by the sentinel inside `content` (see [`AgentResponse::code_is_valid`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Name of the agent that produced the response
    pub agent_name: String,
    /// Generated code, or validator verdict text
    pub content: String,
    /// Whether the agent ran to completion
    pub success: bool,
    /// Failure or diagnostic text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Free-form annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Tokens reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<usize>,
    /// Wall-clock time spent in the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<Duration>,
}

impl AgentResponse {
    /// Successful response carrying `content`
    pub fn ok(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            content: content.into(),
            success: true,
            error_message: None,
            metadata: BTreeMap::new(),
            tokens_used: None,
            processing_time: None,
        }
    }

    /// Failed response with empty content
    pub fn failed(agent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            content: String::new(),
            success: false,
            error_message: Some(error.into()),
            metadata: BTreeMap::new(),
            tokens_used: None,
            processing_time: None,
        }
    }

    /// Attach a diagnostic to a successful response
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Attach token usage
    pub fn with_tokens(mut self, tokens: Option<usize>) -> Self {
        self.tokens_used = tokens;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when the content carries the validator's success sentinel
    pub fn code_is_valid(&self) -> bool {
        self.content.contains(SUCCESS_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_has_error_message() {
        let response = AgentResponse::failed("code-generator", "boom");
        assert!(!response.success);
        assert_eq!(response.error_message.as_deref(), Some("boom"));
        assert!(response.content.is_empty());
    }

    #[test]
    fn test_code_is_valid_reads_sentinel() {
        assert!(AgentResponse::ok("v", "::success::").code_is_valid());
        assert!(AgentResponse::ok("v", "Looks good ::success:: ship it").code_is_valid());
        assert!(!AgentResponse::ok("v", "Validation failed: x").code_is_valid());
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(AgentResponse::ok("g", "code")).unwrap();
        assert!(json.get("error_message").is_none());
        assert!(json.get("metadata").is_none());
        assert_eq!(json["success"], true);
    }
}
