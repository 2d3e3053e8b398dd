//! Property-based tests for the session state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::catalog::{ScriptureReference, Topic};
use crate::prompt::PromptKind;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_topic(question_count: usize, verse_count: usize) -> Arc<Topic> {
    Arc::new(Topic {
        id: "topic".to_string(),
        title: "Topic".to_string(),
        description: String::new(),
        questions: (0..question_count).map(|i| format!("Question {i}")).collect(),
        bible_references: (0..verse_count)
            .map(|i| ScriptureReference {
                book: "Psalms".to_string(),
                chapter: 23,
                verse: (i + 1).to_string(),
                text: format!("verse {i}"),
            })
            .collect(),
    })
}

fn test_context(question_count: usize, verse_count: usize) -> SessionContext {
    SessionContext::new("prop-session", test_topic(question_count, verse_count))
}

fn phase_rank(phase: Phase) -> usize {
    match phase {
        Phase::Questioning { .. } => 0,
        Phase::AwaitingVerseComment => 1,
        Phase::Reflecting => 2,
        Phase::Complete => 3,
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_kind() -> impl Strategy<Value = PromptKind> {
    prop_oneof![
        Just(PromptKind::QuestionGeneration),
        Just(PromptKind::Encouragement),
        Just(PromptKind::VerseReflection),
        Just(PromptKind::Chat),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), Just("  ".to_string()), "[a-z ]{1,20}"]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => arb_text().prop_map(|text| Event::SubmitAnswer { text }),
        1 => arb_text().prop_map(|text| Event::SubmitReflection { text }),
        1 => Just(Event::RetryVerseComment),
        1 => (0usize..6).prop_map(|index| Event::VerseSelected { index }),
        3 => (arb_kind(), "[a-z]{1,10}").prop_map(|(kind, text)| Event::GenerationSucceeded { kind, text }),
        1 => (arb_kind(), "[a-z]{1,10}").prop_map(|(kind, message)| Event::GenerationFailed { kind, message }),
    ]
}

/// Whether a generation succeeds
fn arb_outcome() -> impl Strategy<Value = bool> {
    prop::bool::weighted(0.8)
}

// ============================================================================
// Invariants
// ============================================================================

fn check_invariants(state: &SessionState, context: &SessionContext) -> Result<(), TestCaseError> {
    prop_assert!(state.answers.len() <= state.current_step);
    prop_assert!(state.current_step <= context.topic.question_count());

    if let Phase::Questioning { step } = state.phase {
        prop_assert_eq!(step, state.current_step);
        prop_assert_eq!(state.answers.len(), state.current_step);
    }

    if let Some(verse) = &state.selected_verse {
        prop_assert!(context.topic.bible_references.contains(verse));
    }

    for (i, answer) in state.answers.iter().enumerate() {
        prop_assert_eq!(answer.question_index, i);
    }

    if state.final_comment.is_some() {
        prop_assert!(state.selected_verse.is_some());
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_invariants_hold_for_any_event_sequence(
        question_count in 1usize..5,
        verse_count in 1usize..4,
        events in prop::collection::vec(arb_event(), 0..60)
    ) {
        let context = test_context(question_count, verse_count);
        let mut state = SessionState::new("topic");

        for event in events {
            let before = state.clone();
            if let Ok(result) = transition(&state, &context, event) {
                state = result.new_state;
            }

            check_invariants(&state, &context)?;
            prop_assert!(state.answers.len() >= before.answers.len());
            prop_assert!(state.current_step >= before.current_step);
            prop_assert!(phase_rank(state.phase) >= phase_rank(before.phase));
            prop_assert_eq!(&state.answers[..before.answers.len()], &before.answers[..]);
        }
    }

    #[test]
    fn prop_pending_rejects_user_actions(
        text in "[a-z]{1,10}",
        event in arb_event()
    ) {
        let context = test_context(3, 2);
        let state = transition(&SessionState::new("topic"), &context, Event::SubmitAnswer { text })
            .unwrap()
            .new_state;
        prop_assert!(state.pending.is_some());

        if event.is_user_action() {
            let result = transition(&state, &context, event);
            prop_assert_eq!(result.unwrap_err(), TransitionError::GenerationPending);
        }
    }

    #[test]
    fn prop_failure_leaves_progress_unchanged(
        answered in 0usize..3,
        message in "[a-z ]{1,20}"
    ) {
        let context = test_context(3, 2);
        let mut state = SessionState::new("topic");
        for i in 0..answered {
            state = transition(&state, &context, Event::SubmitAnswer { text: format!("a{i}") }).unwrap().new_state;
            state = transition(&state, &context, Event::GenerationSucceeded {
                kind: PromptKind::Encouragement,
                text: "c".to_string(),
            }).unwrap().new_state;
        }

        let pending = transition(&state, &context, Event::SubmitAnswer { text: "next".to_string() })
            .unwrap()
            .new_state;
        let failed = transition(&pending, &context, Event::GenerationFailed {
            kind: PromptKind::Encouragement,
            message,
        }).unwrap().new_state;

        prop_assert_eq!(failed.phase, state.phase);
        prop_assert_eq!(failed.current_step, state.current_step);
        prop_assert_eq!(&failed.answers, &state.answers);
        prop_assert!(failed.pending.is_none());

        // Resubmitting then succeeding advances exactly once
        let resubmitted = transition(&failed, &context, Event::SubmitAnswer { text: "next".to_string() })
            .unwrap()
            .new_state;
        let advanced = transition(&resubmitted, &context, Event::GenerationSucceeded {
            kind: PromptKind::Encouragement,
            text: "c".to_string(),
        }).unwrap().new_state;
        prop_assert_eq!(advanced.current_step, state.current_step + 1);
        prop_assert_eq!(advanced.answers.len(), state.answers.len() + 1);
    }

    #[test]
    fn prop_full_walkthrough_visits_each_question_once(
        question_count in 1usize..6,
        verse_count in 1usize..5,
        verse_pick in 0usize..100,
        outcomes in prop::collection::vec(arb_outcome(), 0..20)
    ) {
        let context = test_context(question_count, verse_count);
        let mut state = SessionState::new("topic");
        let mut outcomes = outcomes.into_iter();
        let mut questioning_steps = Vec::new();

        while let Phase::Questioning { step } = state.phase {
            if questioning_steps.last() != Some(&step) {
                questioning_steps.push(step);
            }
            state = transition(&state, &context, Event::SubmitAnswer { text: format!("answer {step}") })
                .unwrap()
                .new_state;
            let event = if outcomes.next().unwrap_or(true) {
                Event::GenerationSucceeded { kind: PromptKind::Encouragement, text: "comment".to_string() }
            } else {
                Event::GenerationFailed { kind: PromptKind::Encouragement, message: "down".to_string() }
            };
            state = transition(&state, &context, event).unwrap().new_state;
        }

        prop_assert_eq!(questioning_steps, (0..question_count).collect::<Vec<_>>());
        prop_assert_eq!(state.phase, Phase::AwaitingVerseComment);
        prop_assert_eq!(state.answers.len(), question_count);

        let index = verse_pick % verse_count;
        state = transition(&state, &context, Event::VerseSelected { index }).unwrap().new_state;
        prop_assert_eq!(state.selected_verse.as_ref(), context.topic.bible_references.get(index));
    }
}
