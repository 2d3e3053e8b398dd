//! Pure state transition function

use super::{Answer, Effect, Event, PendingRequest, Phase, SessionContext, SessionState};
use crate::prompt::{self, PromptKind, PromptRequest};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A generation is already in progress; wait for it to finish")]
    GenerationPending,
    #[error("Input must not be empty")]
    EmptyInput,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; verse choice
/// and text generation come back in as events.
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.is_complete() {
        return Err(invalid("session is complete"));
    }
    if event.is_user_action() && state.pending.is_some() {
        return Err(TransitionError::GenerationPending);
    }

    match (state.phase, event) {
        // ============================================================
        // Questions
        // ============================================================
        (Phase::Questioning { step }, Event::SubmitAnswer { text }) => {
            let answer = non_blank(&text)?;
            let question = context
                .topic
                .question(step)
                .ok_or_else(|| invalid(format!("topic has no question {step}")))?;

            let request = prompt::encouragement(question, &answer);
            let mut new_state = state.clone();
            new_state.pending = Some(PendingRequest::Encouragement {
                question_index: step,
                answer,
            });
            new_state.last_error = None;

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::request(request))
                .with_effect(Effect::NotifyStateChange))
        }

        (Phase::Questioning { step }, Event::GenerationSucceeded { kind, text }) => {
            let Some(PendingRequest::Encouragement {
                question_index,
                answer,
            }) = &state.pending
            else {
                return Err(unexpected_result(kind));
            };
            expect_kind(kind, PromptKind::Encouragement)?;
            if *question_index != step {
                return Err(invalid(format!(
                    "comment for question {question_index} arrived at step {step}"
                )));
            }

            let mut new_state = state.clone();
            new_state.pending = None;
            new_state.answers.push(Answer {
                question_index: step,
                question: context.topic.question(step).unwrap_or_default().to_string(),
                text: answer.clone(),
                comment: text,
            });
            new_state.current_step = step + 1;

            if new_state.current_step < context.topic.question_count() {
                new_state.phase = Phase::Questioning {
                    step: new_state.current_step,
                };
                Ok(TransitionResult::new(new_state).with_effect(Effect::NotifyStateChange))
            } else {
                // The view is broadcast once the verse is chosen
                new_state.phase = Phase::AwaitingVerseComment;
                Ok(TransitionResult::new(new_state).with_effect(Effect::SelectVerse {
                    candidates: context.topic.bible_references.len(),
                }))
            }
        }

        // ============================================================
        // Verse reflection
        // ============================================================
        (Phase::AwaitingVerseComment, Event::VerseSelected { index }) => {
            if state.selected_verse.is_some() {
                return Err(invalid("verse already selected"));
            }
            if state.pending.is_some() {
                return Err(TransitionError::GenerationPending);
            }
            let verse = context
                .topic
                .bible_references
                .get(index)
                .ok_or_else(|| invalid(format!("verse index {index} out of range")))?;

            let mut new_state = state.clone();
            new_state.selected_verse = Some(verse.clone());
            let request = verse_request(&new_state)?;
            new_state.pending = Some(PendingRequest::VerseComment);

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::request(request))
                .with_effect(Effect::NotifyStateChange))
        }

        (Phase::AwaitingVerseComment, Event::RetryVerseComment) => {
            if state.selected_verse.is_none() {
                return Err(invalid("no verse selected yet"));
            }
            let request = verse_request(state)?;
            let mut new_state = state.clone();
            new_state.pending = Some(PendingRequest::VerseComment);
            new_state.last_error = None;

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::request(request))
                .with_effect(Effect::NotifyStateChange))
        }

        (Phase::AwaitingVerseComment, Event::GenerationSucceeded { kind, text }) => {
            if state.pending != Some(PendingRequest::VerseComment) {
                return Err(unexpected_result(kind));
            }
            expect_kind(kind, PromptKind::VerseReflection)?;

            let mut new_state = state.clone();
            new_state.pending = None;
            new_state.final_comment = Some(text);
            new_state.phase = Phase::Reflecting;

            Ok(TransitionResult::new(new_state).with_effect(Effect::NotifyStateChange))
        }

        // ============================================================
        // Closing reflection
        // ============================================================
        (Phase::Reflecting, Event::SubmitReflection { text }) => {
            let answer = non_blank(&text)?;
            let request = prompt::closing_reflection(&answer);

            let mut new_state = state.clone();
            new_state.pending = Some(PendingRequest::Reflection { answer });
            new_state.last_error = None;

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::request(request))
                .with_effect(Effect::NotifyStateChange))
        }

        (Phase::Reflecting, Event::GenerationSucceeded { kind, text }) => {
            let Some(PendingRequest::Reflection { answer }) = &state.pending else {
                return Err(unexpected_result(kind));
            };
            expect_kind(kind, PromptKind::Encouragement)?;

            let mut new_state = state.clone();
            new_state.reflection_answer = Some(answer.clone());
            new_state.reflection_comment = Some(text);
            new_state.pending = None;
            new_state.phase = Phase::Complete;

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::NotifyStateChange)
                .with_effect(Effect::NotifyComplete))
        }

        // ============================================================
        // Failures leave progress untouched
        // ============================================================
        (_, Event::GenerationFailed { kind, message }) => {
            let Some(pending) = &state.pending else {
                return Err(unexpected_result(kind));
            };
            expect_kind(kind, pending.kind())?;

            let mut new_state = state.clone();
            new_state.pending = None;
            new_state.last_error = Some(message.clone());

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::NotifyGenerationFailed { kind, message })
                .with_effect(Effect::NotifyStateChange))
        }

        (phase, event) => Err(invalid(format!(
            "{event:?} is not accepted while {}",
            phase.name()
        ))),
    }
}

fn invalid(message: impl Into<String>) -> TransitionError {
    TransitionError::InvalidTransition(message.into())
}

fn unexpected_result(kind: PromptKind) -> TransitionError {
    invalid(format!("unexpected {kind} result"))
}

fn expect_kind(got: PromptKind, expected: PromptKind) -> Result<(), TransitionError> {
    if got == expected {
        Ok(())
    } else {
        Err(invalid(format!("expected {expected} result, got {got}")))
    }
}

fn non_blank(text: &str) -> Result<String, TransitionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(TransitionError::EmptyInput)
    } else {
        Ok(trimmed.to_string())
    }
}

fn verse_request(state: &SessionState) -> Result<PromptRequest, TransitionError> {
    let verse = state
        .selected_verse
        .as_ref()
        .ok_or_else(|| invalid("no verse selected"))?;
    let questions: Vec<String> = state.answers.iter().map(|a| a.question.clone()).collect();
    let answers: Vec<String> = state.answers.iter().map(|a| a.text.clone()).collect();
    Ok(prompt::verse_reflection(&questions, &answers, verse))
}
