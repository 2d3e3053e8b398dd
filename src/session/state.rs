//! Session state types

use crate::catalog::{ScriptureReference, Topic};
use crate::prompt::PromptKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where the participant is in the study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Answering question `step` (zero-based)
    Questioning { step: usize },
    /// All questions answered; the verse reflection is being produced
    AwaitingVerseComment,
    /// Verse reflection shown; waiting for the closing reflection
    Reflecting,
    Complete,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Questioning { .. } => "questioning",
            Phase::AwaitingVerseComment => "awaiting_verse_comment",
            Phase::Reflecting => "reflecting",
            Phase::Complete => "complete",
        }
    }
}

/// An answered question together with the comment it received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_index: usize,
    pub question: String,
    pub text: String,
    pub comment: String,
}

/// The single generation a session may have outstanding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    /// Answer to `question_index`, held here until its comment arrives
    Encouragement { question_index: usize, answer: String },
    VerseComment,
    Reflection { answer: String },
}

impl PendingRequest {
    /// Prompt kind whose result resolves this request
    pub fn kind(&self) -> PromptKind {
        match self {
            PendingRequest::Encouragement { .. } | PendingRequest::Reflection { .. } => {
                PromptKind::Encouragement
            }
            PendingRequest::VerseComment => PromptKind::VerseReflection,
        }
    }
}

/// Full state of one study session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub topic_id: String,
    pub phase: Phase,
    pub current_step: usize,
    pub answers: Vec<Answer>,
    pub selected_verse: Option<ScriptureReference>,
    pub final_comment: Option<String>,
    pub reflection_answer: Option<String>,
    pub reflection_comment: Option<String>,
    pub pending: Option<PendingRequest>,
    /// Message of the most recent failed generation, cleared on the next request
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            phase: Phase::Questioning { step: 0 },
            current_step: 0,
            answers: Vec::new(),
            selected_verse: None,
            final_comment: None,
            reflection_answer: None,
            reflection_comment: None,
            pending: None,
            last_error: None,
        }
    }

    pub fn is_awaiting_generation(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }
}

/// Immutable per-session data the transition function reads
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub topic: Arc<Topic>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, topic: Arc<Topic>) -> Self {
        Self {
            session_id: session_id.into(),
            topic,
        }
    }
}
