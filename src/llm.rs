//! Chat-completion providers
//!
//! The completion gateway picks one of these per prompt kind through the
//! registry; call logging happens at the gateway.

mod error;
mod openai;
mod registry;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::{OpenAIModel, OpenAIService};
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;

/// A single chat model behind some provider
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Registry key, e.g. `gpt-4.1-mini`
    fn model_id(&self) -> &str;
}
