//! Effects produced by state transitions

use crate::prompt::{PromptKind, PromptRequest};

/// Effects to be executed after a state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send a prompt to the completion gateway (spawns a background task)
    RequestCompletion { request: PromptRequest },

    /// Draw one verse uniformly from `candidates` references
    SelectVerse { candidates: usize },

    /// Broadcast the new session view
    NotifyStateChange,

    /// Tell subscribers a generation failed and can be retried
    NotifyGenerationFailed { kind: PromptKind, message: String },

    /// The study is finished
    NotifyComplete,
}

impl Effect {
    pub fn request(request: PromptRequest) -> Self {
        Effect::RequestCompletion { request }
    }
}
