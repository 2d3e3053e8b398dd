//! Completion gateway
//!
//! One call per prompt: send a formatted request to whichever model the
//! registry routes its kind to and return the generated text.

use crate::llm::{LlmErrorKind, ModelRegistry};
use crate::prompt::{PromptKind, PromptRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a generation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The provider returned an error
    Provider(LlmErrorKind),
    /// The provider answered with no usable text
    EmptyResponse,
    Timeout,
    /// No model is configured for this prompt kind
    Unavailable,
}

impl FailureCause {
    pub fn is_retryable(self) -> bool {
        match self {
            FailureCause::Provider(kind) => kind.is_retryable(),
            FailureCause::Timeout => true,
            FailureCause::EmptyResponse | FailureCause::Unavailable => false,
        }
    }
}

/// A failed generation; partial text is never returned
#[derive(Debug, Clone, Error)]
#[error("{kind} generation failed: {message}")]
pub struct GenerationError {
    pub kind: PromptKind,
    pub cause: FailureCause,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl GenerationError {
    pub fn new(kind: PromptKind, cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            kind,
            cause,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.cause.is_retryable()
    }
}

/// Text-generation boundary used by sessions and the API
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, request: &PromptRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: CompletionGateway + ?Sized> CompletionGateway for Arc<T> {
    async fn complete(&self, request: &PromptRequest) -> Result<String, GenerationError> {
        (**self).complete(request).await
    }
}

/// Bounded retry with exponential backoff; only retryable failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (zero-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Gateway backed by the model registry
pub struct LlmGateway {
    registry: Arc<ModelRegistry>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl LlmGateway {
    pub fn new(registry: Arc<ModelRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn attempt(&self, request: &PromptRequest) -> Result<String, GenerationError> {
        let kind = request.kind;
        let service = self.registry.service_for(kind).ok_or_else(|| {
            GenerationError::new(kind, FailureCause::Unavailable, "No LLM configured")
        })?;

        let llm_request = request.to_llm_request();
        let model = service.model_id();
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, service.complete(&llm_request)).await;
        let duration_ms = start.elapsed().as_millis();

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(
                    kind = %kind,
                    model,
                    duration_ms = %duration_ms,
                    error_kind = e.kind.as_str(),
                    retryable = e.kind.is_retryable(),
                    error = %e.message,
                    "Completion failed"
                );
                return Err(GenerationError {
                    kind,
                    cause: FailureCause::Provider(e.kind),
                    message: e.message,
                    retry_after: e.retry_after,
                });
            }
            Err(_) => {
                tracing::error!(kind = %kind, model, duration_ms = %duration_ms, "Completion timed out");
                return Err(GenerationError::new(
                    kind,
                    FailureCause::Timeout,
                    format!("No response within {}s", self.timeout.as_secs()),
                ));
            }
        };

        tracing::info!(
            kind = %kind,
            model,
            duration_ms = %duration_ms,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            end_turn = response.end_turn,
            "Completion finished"
        );
        if !response.end_turn {
            tracing::warn!(kind = %kind, model, "Completion stopped before the end of its turn");
        }

        let text = response.content.trim();
        if text.is_empty() {
            return Err(GenerationError::new(
                kind,
                FailureCause::EmptyResponse,
                "Provider returned no text",
            ));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl CompletionGateway for LlmGateway {
    async fn complete(&self, request: &PromptRequest) -> Result<String, GenerationError> {
        let mut retry = 0;
        loop {
            match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    // Never wait longer between attempts than one attempt may take
                    let delay = e
                        .retry_after
                        .unwrap_or_else(|| self.retry.delay_for(retry))
                        .min(self.timeout);
                    tracing::warn!(
                        kind = %request.kind,
                        retry = retry + 1,
                        delay_ms = %delay.as_millis(),
                        error = %e.message,
                        "Retrying generation"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
