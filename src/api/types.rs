//! API request and response types

use crate::catalog::{Category, Topic, TopicCatalog};
use crate::llm::LlmMessage;
use serde::{Deserialize, Serialize};

/// Topic entry in the listing
#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub question_count: usize,
    pub verse_count: usize,
}

impl From<&Topic> for TopicSummary {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id.clone(),
            title: topic.title.clone(),
            description: topic.description.clone(),
            question_count: topic.question_count(),
            verse_count: topic.bible_references.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub topics: Vec<TopicSummary>,
}

impl CategoryResponse {
    pub fn new(catalog: &TopicCatalog, category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            title: category.title.clone(),
            description: category.description.clone(),
            topics: catalog.topics_in(category).map(TopicSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub categories: Vec<CategoryResponse>,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub topic: Topic,
}

/// Request to generate one follow-up question for a topic
#[derive(Debug, Deserialize)]
pub struct GenerateQuestionRequest {
    #[serde(default)]
    pub previous_answers: Vec<String>,
    /// Zero-based index of the question to generate
    pub current_step: usize,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question: String,
}

/// Free chat with the study assistant
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<LlmMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub topic_id: String,
}

/// Answer or closing reflection text
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error class
    pub kind: &'static str,
}

impl ErrorResponse {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind,
        }
    }
}
