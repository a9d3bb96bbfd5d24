use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use dslsmith::agent::{Agent, AgentContext, AgentResponse};
use dslsmith::error::{DslsmithError, Result};
use dslsmith::providers::{CompletionOptions, CompletionResponse, Message, Provider};

/// Provider answering with canned replies, in order
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CannedProvider {
    replies: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CannedProvider {
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(
                replies.into_iter().map(|r| Ok(r.into())).collect(),
            )),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: &str) -> Self {
        let provider = Self::default();
        provider
            .replies
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
        provider
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for CannedProvider {
    async fn complete(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(CompletionResponse::new(Message::assistant(reply))),
            Some(Err(error)) => Err(DslsmithError::Provider(error).into()),
            None => Err(DslsmithError::Provider("out of replies".to_string()).into()),
        }
    }

    fn current_model(&self) -> String {
        "canned".to_string()
    }
}

/// Wraps an agent and counts its invocations
#[allow(dead_code)]
pub struct CountingAgent {
    inner: Arc<dyn Agent>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl CountingAgent {
    pub fn wrap(inner: Arc<dyn Agent>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for CountingAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, context: &AgentContext) -> AgentResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(context).await
    }
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
