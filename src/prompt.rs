//! Prompt formatting
//!
//! Pure builders that turn study data into provider requests. The same
//! input always yields the same request.

use crate::catalog::ScriptureReference;
use crate::llm::{LlmMessage, LlmRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;

/// Fixed question asked once the verse reflection has been read
pub const REFLECTION_QUESTION: &str =
    "Looking back over this study, what did you learn or notice about yourself?";

const QUESTION_SYSTEM_PROMPT: &str = "\
You are a guide for a Bible study. Write one open-ended question that helps \
the participant think more deeply about the topic.

Vary the angle from step to step. Useful angles:
- the participant's own experiences
- how other people might see it
- how it plays out in everyday life
- the feelings and values underneath it
- what it could mean for the future

Rules:
- 2 to 3 sentences
- understandable to someone who is not a Christian
- build on what the participant has already shared
- output only the question";

const ENCOURAGEMENT_SYSTEM_PROMPT: &str = "\
You are a warm, experienced pastor responding to a participant in a Bible \
study. Reply to their answer with empathy and encouragement.

Rules:
- show that you understood what they shared
- stay positive; avoid negative or judgmental phrasing
- do not quote scripture directly
- keep it concise, about 200 characters";

const VERSE_REFLECTION_SYSTEM_PROMPT: &str = "\
You are a pastor closing a Bible study. The participant has answered every \
question. Explain the chosen verse and connect it to their answers.

Cover:
- the background and context of the verse
- the era it was written in and the purpose it was written for
- how it can be read today
- how it speaks to what the participant shared

Keep it about 400 characters, in a warm and encouraging tone.";

const CHAT_SYSTEM_PROMPT: &str = "\
You are a friendly Bible study assistant. Help the user understand scripture, \
its historical background and how it applies to daily life. Be respectful of \
every background and answer clearly and kindly.";

/// What a prompt is for; also selects its model parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    QuestionGeneration,
    Encouragement,
    VerseReflection,
    Chat,
}

impl PromptKind {
    pub fn params(self) -> ModelParams {
        match self {
            PromptKind::QuestionGeneration => ModelParams {
                temperature: 0.8,
                max_tokens: 150,
            },
            PromptKind::Encouragement => ModelParams {
                temperature: 0.7,
                max_tokens: 500,
            },
            PromptKind::VerseReflection | PromptKind::Chat => ModelParams {
                temperature: 0.7,
                max_tokens: 1000,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::QuestionGeneration => "question_generation",
            PromptKind::Encouragement => "encouragement",
            PromptKind::VerseReflection => "verse_reflection",
            PromptKind::Chat => "chat",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A fully formatted request for the completion gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub kind: PromptKind,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Earlier conversation turns sent before `user_prompt`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_turns: Vec<LlmMessage>,
    pub params: ModelParams,
}

impl PromptRequest {
    fn new(kind: PromptKind, system_prompt: &str, user_prompt: String) -> Self {
        Self {
            kind,
            system_prompt: system_prompt.to_string(),
            user_prompt,
            prior_turns: Vec::new(),
            params: kind.params(),
        }
    }

    pub fn to_llm_request(&self) -> LlmRequest {
        let mut messages = self.prior_turns.clone();
        messages.push(LlmMessage::user(self.user_prompt.clone()));

        LlmRequest {
            system: Some(self.system_prompt.clone()),
            messages,
            max_tokens: Some(self.params.max_tokens),
            temperature: Some(self.params.temperature),
        }
    }
}

/// Input for generating the next study question
#[derive(Debug, Clone)]
pub struct QuestionInput<'a> {
    pub topic_title: &'a str,
    pub prior_answers: &'a [String],
    /// Zero-based index of the question being generated
    pub step_index: usize,
    pub total_steps: usize,
}

pub fn question_generation(input: &QuestionInput<'_>) -> PromptRequest {
    let mut user = format!("Topic: {}\n", input.topic_title);

    if input.prior_answers.is_empty() {
        user.push_str("The participant has not answered anything yet.\n");
    } else {
        user.push_str("Answers so far:\n");
        for (i, answer) in input.prior_answers.iter().enumerate() {
            let _ = writeln!(user, "{}. {answer}", i + 1);
        }
    }

    let _ = write!(
        user,
        "Current step: {}/{}",
        input.step_index + 1,
        input.total_steps
    );

    PromptRequest::new(PromptKind::QuestionGeneration, QUESTION_SYSTEM_PROMPT, user)
}

pub fn encouragement(question: &str, answer: &str) -> PromptRequest {
    PromptRequest::new(
        PromptKind::Encouragement,
        ENCOURAGEMENT_SYSTEM_PROMPT,
        format!("Question: {question}\nAnswer: {answer}"),
    )
}

/// Closing reflection uses the encouragement contract with a fixed question
pub fn closing_reflection(answer: &str) -> PromptRequest {
    encouragement(REFLECTION_QUESTION, answer)
}

/// Final comment tying the chosen verse to the participant's answers.
///
/// Questions and answers are paired by position.
pub fn verse_reflection(
    questions: &[String],
    answers: &[String],
    verse: &ScriptureReference,
) -> PromptRequest {
    let mut user = String::new();
    for (i, (question, answer)) in questions.iter().zip(answers).enumerate() {
        let _ = writeln!(user, "Question{}: {question}\nAnswer: {answer}", i + 1);
    }
    let _ = write!(user, "\nVerse: {}\n{}", verse.citation(), verse.text);

    PromptRequest::new(
        PromptKind::VerseReflection,
        VERSE_REFLECTION_SYSTEM_PROMPT,
        user,
    )
}

/// Free chat. The last message of `history` becomes the user prompt.
///
/// Returns `None` for an empty history.
pub fn chat(history: &[LlmMessage]) -> Option<PromptRequest> {
    let (last, earlier) = history.split_last()?;
    let mut request = PromptRequest::new(PromptKind::Chat, CHAT_SYSTEM_PROMPT, last.content.clone());
    request.prior_turns = earlier.to_vec();
    Some(request)
}
