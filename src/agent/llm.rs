//! Language-model invocation.
//!
//! Stages talk to the model through the [`LanguageModel`] trait so a single
//! client can be injected everywhere and replaced by a scripted double in
//! tests. [`OllamaClient`] is the HTTP implementation; [`TimeoutGuard`]
//! bounds every call.

use crate::error::ModelInvocationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Anything that turns a prompt into completion text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError>;

    /// Model name for reports and logs.
    fn model_name(&self) -> &str;
}

/// Settings for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.3,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Non-streaming client for Ollama's `/api/chat` endpoint.
pub struct OllamaClient {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, ModelInvocationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ModelInvocationError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_request(&self, prompt: &str) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        let url = format!("{}/api/chat", self.config.ollama_url);
        let request = self.build_request(prompt);

        debug!(
            "Sending {} byte prompt to {}",
            prompt.len(),
            self.config.model_name
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelInvocationError::Timeout {
                        seconds: self.config.timeout_seconds,
                    }
                } else if e.is_connect() {
                    ModelInvocationError::Connect {
                        url: self.config.ollama_url.clone(),
                    }
                } else {
                    ModelInvocationError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelInvocationError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ModelInvocationError::InvalidResponse(e.to_string()))?;

        Ok(chat_response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

/// Wraps a model so that every call fails with `Timeout` once `limit` passes.
pub struct TimeoutGuard {
    inner: Arc<dyn LanguageModel>,
    limit: Duration,
}

impl TimeoutGuard {
    pub fn new(inner: Arc<dyn LanguageModel>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl LanguageModel for TimeoutGuard {
    async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError> {
        match tokio::time::timeout(self.limit, self.inner.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelInvocationError::Timeout {
                seconds: self.limit.as_secs(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
