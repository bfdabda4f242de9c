//! OpenAI-compatible chat backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use reverie_core::{defaults, ChatDiagnostics, Error, GenerationBackend, Result};

use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Request timeout in seconds. The job runners impose their own
    /// bounded-wait ceiling on top of this.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            gen_model: defaults::ENTRY_MODEL.to_string(),
            temperature: defaults::GEN_TEMPERATURE,
            max_tokens: defaults::ENTRY_MAX_TOKENS,
            timeout_seconds: defaults::ENTRY_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    /// Configuration for single-entry analysis, from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
    /// | `OPENAI_API_KEY` | unset |
    /// | `REVERIE_ENTRY_MODEL` | `gpt-4o-mini` |
    pub fn entry_from_env() -> Self {
        Self {
            gen_model: std::env::var("REVERIE_ENTRY_MODEL")
                .unwrap_or_else(|_| defaults::ENTRY_MODEL.to_string()),
            max_tokens: defaults::ENTRY_MAX_TOKENS,
            timeout_seconds: defaults::ENTRY_TIMEOUT_SECS,
            ..Self::common_from_env()
        }
    }

    /// Configuration for batch insight generation, from the environment.
    ///
    /// Uses `REVERIE_INSIGHT_MODEL` (default `gpt-4o`) and the longer batch
    /// timeout.
    pub fn insight_from_env() -> Self {
        Self {
            gen_model: std::env::var("REVERIE_INSIGHT_MODEL")
                .unwrap_or_else(|_| defaults::INSIGHT_MODEL.to_string()),
            max_tokens: defaults::INSIGHT_MAX_TOKENS,
            timeout_seconds: defaults::INSIGHT_TIMEOUT_SECS,
            ..Self::common_from_env()
        }
    }

    fn common_from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }
}

/// OpenAI-compatible chat backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "ai",
            component = "openai",
            model = %config.gen_model,
            base_url = %config.base_url,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        debug!(
            subsystem = "ai",
            component = "openai",
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            "Requesting chat completion"
        );

        let mut messages = Vec::new();

        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            response_format: Some(ResponseFormat::json_object()),
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response.json().await.unwrap_or(OpenAIErrorResponse {
                error: OpenAIError {
                    message: "Unknown error".to_string(),
                    error_type: "unknown".to_string(),
                    code: None,
                },
            });
            // The status code stays in the message so the error classifier
            // can key on it ("401", "429", ...).
            return Err(Error::Inference(format!(
                "OpenAI returned {}: {}",
                status, body.error.message
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(Error::Inference("Empty response from OpenAI".to_string()));
        }

        debug!(
            subsystem = "ai",
            component = "openai",
            response_len = content.len(),
            "Chat completion received"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl ChatDiagnostics for OpenAIBackend {
    fn configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let mut req = self.client.get(&url).timeout(Duration::from_secs(5));

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        match req.send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!(
                    subsystem = "ai",
                    component = "openai",
                    error = %e,
                    "Health check request failed"
                );
                Ok(false)
            }
        }
    }
}
