//! HTTP request handlers

use super::sse::{reveal_stream, session_stream};
use super::types::{
    CategoryResponse, ChatRequest, ChatResponse, CreateSessionRequest, ErrorResponse,
    GenerateQuestionRequest, QuestionResponse, SuccessResponse, TextRequest, TopicListResponse,
    TopicResponse,
};
use super::AppState;
use crate::catalog::CatalogError;
use crate::gateway::{FailureCause, GenerationError};
use crate::prompt::{self, QuestionInput};
use crate::reveal::reveal_duration;
use crate::runtime::SessionError;
use crate::session::SessionView;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Topic catalog
        .route("/api/topics", get(list_topics))
        .route("/api/topics/:id", get(get_topic))
        .route("/api/topics/:id/questions", post(generate_question))
        // Free chat
        .route("/api/chat", post(chat))
        // Study sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        .route("/api/sessions/:id/answer", post(submit_answer))
        .route("/api/sessions/:id/reflection", post(submit_reflection))
        .route(
            "/api/sessions/:id/final-comment/retry",
            post(retry_final_comment),
        )
        // Streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        .route(
            "/api/sessions/:id/final-comment/reveal",
            get(reveal_final_comment),
        )
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Topics
// ============================================================

async fn list_topics(State(state): State<AppState>) -> Json<TopicListResponse> {
    let catalog = &state.catalog;
    Json(TopicListResponse {
        categories: catalog
            .categories()
            .iter()
            .map(|category| CategoryResponse::new(catalog, category))
            .collect(),
    })
}

async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TopicResponse>, AppError> {
    let topic = state.catalog.find_topic(&id)?;
    Ok(Json(TopicResponse {
        topic: (*topic).clone(),
    }))
}

async fn generate_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateQuestionRequest>,
) -> Result<Json<QuestionResponse>, AppError> {
    let topic = state.catalog.find_topic(&id)?;
    let total_steps = topic.question_count();
    if req.current_step >= total_steps {
        return Err(AppError::BadRequest(format!(
            "current_step must be below {total_steps}"
        )));
    }

    let request = prompt::question_generation(&QuestionInput {
        topic_title: &topic.title,
        prior_answers: &req.previous_answers,
        step_index: req.current_step,
        total_steps,
    });
    let question = state.gateway.complete(&request).await?;

    Ok(Json(QuestionResponse { question }))
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let request = prompt::chat(&req.messages)
        .filter(|r| !r.user_prompt.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("messages must end with a non-empty message".to_string()))?;
    let message = state.gateway.complete(&request).await?;

    Ok(Json(ChatResponse { message }))
}

// ============================================================
// Sessions
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state.sessions.create(&req.topic_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.view(&id).await?))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TextRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.submit_answer(&id, req.text).await?))
}

async fn submit_reflection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TextRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.submit_reflection(&id, req.text).await?))
}

async fn retry_final_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.retry_final_comment(&id).await?))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (view, broadcast_rx) = state.sessions.subscribe(&id).await?;
    Ok(session_stream(view, broadcast_rx))
}

async fn reveal_final_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.sessions.view(&id).await?;
    let text = view
        .final_comment
        .ok_or_else(|| AppError::Conflict("Final comment is not ready yet".to_string()))?;
    tracing::debug!(
        session_id = %id,
        duration_ms = %reveal_duration(&text).as_millis(),
        "Revealing final comment"
    );
    Ok(reveal_stream(text))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("bible-dive ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    /// Action not valid in the current state, or a generation is pending
    Conflict(String),
    Gone(String),
    /// Upstream generation failed; the action can be retried
    Generation(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let message = e.to_string();
        match e {
            SessionError::EmptyInput => AppError::BadRequest(message),
            SessionError::TopicNotFound(_) | SessionError::SessionNotFound(_) => {
                AppError::NotFound(message)
            }
            SessionError::InvalidTransition(_) | SessionError::GenerationPending => {
                AppError::Conflict(message)
            }
            SessionError::SessionClosed => AppError::Gone(message),
            SessionError::GenerationFailure { .. } => AppError::Generation(message),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::TopicNotFound(_) => AppError::NotFound(e.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        tracing::warn!(kind = %e.kind, cause = ?e.cause, error = %e.message, "Generation failed");
        match e.cause {
            FailureCause::Unavailable => AppError::Generation("No LLM configured".to_string()),
            _ => AppError::Generation(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Gone(msg) => (StatusCode::GONE, "session_closed", msg),
            AppError::Generation(msg) => (StatusCode::BAD_GATEWAY, "generation_failed", msg),
        };

        let body = Json(ErrorResponse::new(kind, message));
        (status, body).into_response()
    }
}
