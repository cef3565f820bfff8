//! The chat-model seam and its resilience wrappers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use relay_core::{Message, ToolCall};

/// Tool definition as presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One model invocation: system prompt, history, and tool schemas.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    /// Disabled for supervisors so at most one handoff can be requested
    /// per reasoning step.
    pub parallel_tool_calls: bool,
}

/// What the model produced: a final text answer, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![ToolCall::new(
                uuid::Uuid::new_v4().to_string(),
                name,
                arguments,
            )],
        }
    }
}

/// Errors from the model layer.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider: {0}")]
    Provider(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ModelError {
    /// Whether retrying the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Provider(message) => is_retryable_error(message),
            Self::Malformed(_) => false,
        }
    }
}

/// Check if a provider error message indicates a transient failure.
fn is_retryable_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("overloaded")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
}

/// The LLM call, as seen by the engine. Prompt formatting, model
/// selection, and token accounting all live behind this trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError>;
}

/// Type alias for a shared model.
pub type BoxedModel = Arc<dyn ChatModel>;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Wraps a model with a wall-clock timeout. Timeouts surface as a
/// retryable [`ModelError::Timeout`], not a fatal failure.
pub struct TimeoutModel<M> {
    inner: M,
    timeout: Duration,
}

impl<M> TimeoutModel<M> {
    pub fn new(inner: M, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for TimeoutModel<M> {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        tokio::time::timeout(self.timeout, self.inner.complete(request))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout))?
    }
}

/// Wraps a model with bounded exponential-backoff retries on
/// retryable failures.
pub struct RetryingModel<M> {
    inner: M,
    config: RetryConfig,
}

impl<M> RetryingModel<M> {
    pub fn new(inner: M, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for RetryingModel<M> {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.config.max_retries && e.is_retryable() => {
                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Model request failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt + 1,
                        self.config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
