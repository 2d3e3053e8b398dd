//! Serializable snapshot of a session

use super::{Answer, Phase, SessionContext, SessionState};
use crate::catalog::ScriptureReference;
use crate::prompt::REFLECTION_QUESTION;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only view returned by the API and broadcast on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub topic_id: String,
    pub topic_title: String,
    pub phase: Phase,
    pub current_step: usize,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<String>,
    pub answers: Vec<Answer>,
    pub selected_verse: Option<ScriptureReference>,
    pub final_comment: Option<String>,
    /// Closing question, present once the verse reflection is available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection_prompt: Option<String>,
    pub reflection_answer: Option<String>,
    pub reflection_comment: Option<String>,
    pub awaiting_generation: bool,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(state: &SessionState, context: &SessionContext, created_at: DateTime<Utc>) -> Self {
        let current_question = match state.phase {
            Phase::Questioning { step } => context.topic.question(step).map(str::to_string),
            _ => None,
        };
        let reflection_prompt = matches!(state.phase, Phase::Reflecting | Phase::Complete)
            .then(|| REFLECTION_QUESTION.to_string());

        Self {
            session_id: context.session_id.clone(),
            topic_id: state.topic_id.clone(),
            topic_title: context.topic.title.clone(),
            phase: state.phase,
            current_step: state.current_step,
            question_count: context.topic.question_count(),
            current_question,
            answers: state.answers.clone(),
            selected_verse: state.selected_verse.clone(),
            final_comment: state.final_comment.clone(),
            reflection_prompt,
            reflection_answer: state.reflection_answer.clone(),
            reflection_comment: state.reflection_comment.clone(),
            awaiting_generation: state.is_awaiting_generation(),
            last_error: state.last_error.clone(),
            created_at,
        }
    }
}
