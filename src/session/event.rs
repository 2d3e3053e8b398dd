//! Events that can occur in a study session

use crate::prompt::PromptKind;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    SubmitAnswer {
        text: String,
    },
    SubmitReflection {
        text: String,
    },
    RetryVerseComment,

    // Runtime events
    /// Index into the topic's bible references, drawn by the runtime
    VerseSelected {
        index: usize,
    },
    GenerationSucceeded {
        kind: PromptKind,
        text: String,
    },
    GenerationFailed {
        kind: PromptKind,
        message: String,
    },
}

impl Event {
    /// True for events originating from the participant
    pub fn is_user_action(&self) -> bool {
        matches!(
            self,
            Event::SubmitAnswer { .. } | Event::SubmitReflection { .. } | Event::RetryVerseComment
        )
    }
}
