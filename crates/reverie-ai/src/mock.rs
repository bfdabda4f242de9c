//! Mock chat backend for deterministic testing.
//!
//! Scripted replies and failures pop in order; once the script is empty the
//! default response repeats. Latency is simulated with `tokio::time::sleep`
//! so tests can drive it under a paused clock.
//!
//! ## Usage
//!
//! ```rust
//! use reverie_ai::mock::MockChatBackend;
//! use reverie_core::GenerationBackend;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = MockChatBackend::new()
//!     .with_response("{\"ok\": true}")
//!     .push_failure("OpenAI returned 429: Too Many Requests");
//!
//! // First call hits the scripted failure, later calls get the default.
//! assert!(backend.generate("prompt").await.is_err());
//! assert!(backend.generate("prompt").await.is_ok());
//! assert_eq!(backend.call_count(), 2);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reverie_core::{ChatDiagnostics, Error, GenerationBackend, Result};

/// One recorded generation call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
enum ScriptedReply {
    Reply(String),
    Failure(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<ScriptedReply>,
    calls: Vec<MockCall>,
}

/// Mock chat backend for testing.
#[derive(Clone)]
pub struct MockChatBackend {
    state: Arc<Mutex<MockState>>,
    default_response: String,
    permanent_failure: Option<String>,
    latency: Duration,
    model: String,
}

impl MockChatBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            default_response: "{}".to_string(),
            permanent_failure: None,
            latency: Duration::ZERO,
            model: "mock-model".to_string(),
        }
    }

    /// Set the default response returned when the script is empty.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Queue a scripted reply for the next unanswered call.
    pub fn push_reply(self, response: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(ScriptedReply::Reply(response.into()));
        self
    }

    /// Queue a scripted failure for the next unanswered call.
    pub fn push_failure(self, message: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .push_back(ScriptedReply::Failure(message.into()));
        self
    }

    /// Make every call fail with the given message (clears any script).
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.state.lock().unwrap().script.clear();
        self.permanent_failure = Some(message.into());
        self
    }

    /// Set simulated latency for all calls.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of generation calls made so far.
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockChatBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(MockCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
            });
            state.script.pop_front()
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(ref message) = self.permanent_failure {
            return Err(Error::Inference(message.clone()));
        }

        match scripted {
            Some(ScriptedReply::Reply(text)) => Ok(text),
            Some(ScriptedReply::Failure(message)) => Err(Error::Inference(message)),
            None => Ok(self.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatDiagnostics for MockChatBackend {
    fn configured(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.permanent_failure.is_none())
    }
}
