//! Runtime for executing study sessions
//!
//! One actor task per session applies transitions and executes effects;
//! the manager routes API calls to the right actor.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::catalog::{CatalogError, TopicCatalog};
use crate::gateway::CompletionGateway;
use crate::prompt::PromptKind;
use crate::session::{Event, SessionContext, SessionView, TransitionError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the runtime used by the server
pub type ProductionRuntime = SessionRuntime<Arc<dyn CompletionGateway>>;

const MESSAGE_CHANNEL_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 64;

/// Errors surfaced to callers of the session API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{kind} generation failed: {message}")]
    GenerationFailure { kind: PromptKind, message: String },
    #[error("Topic not found: {0}")]
    TopicNotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("A generation is already in progress; wait for it to finish")]
    GenerationPending,
    #[error("Input must not be empty")]
    EmptyInput,
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session closed")]
    SessionClosed,
}

impl From<TransitionError> for SessionError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::GenerationPending => SessionError::GenerationPending,
            TransitionError::EmptyInput => SessionError::EmptyInput,
            TransitionError::InvalidTransition(msg) => SessionError::InvalidTransition(msg),
        }
    }
}

/// Events sent to SSE subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChange { view: Box<SessionView> },
    Error { message: String },
    Complete,
}

pub type Reply = oneshot::Sender<Result<SessionView, SessionError>>;

/// Messages handled by a session actor
#[derive(Debug)]
pub enum RuntimeMessage {
    /// A participant action; replied to once its generation resolves
    Action { event: Event, reply: Reply },
    Snapshot { reply: oneshot::Sender<SessionView> },
    /// Outcome of a background generation
    Generation { request_id: u64, event: Event },
}

/// Runtime knobs shared by all sessions
#[derive(Debug, Clone, Copy)]
pub struct RuntimeSettings {
    pub verse_seed: Option<u64>,
    pub idle_timeout: Duration,
}

impl RuntimeSettings {
    fn rng(&self) -> StdRng {
        self.verse_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
    }
}

/// Channels a session actor is wired to
pub struct RuntimeChannels {
    /// Sender half handed to background generation tasks
    pub tx: mpsc::Sender<RuntimeMessage>,
    pub rx: mpsc::Receiver<RuntimeMessage>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
    pub cancel: CancellationToken,
}

/// Handle to interact with a running session
pub struct SessionHandle {
    pub tx: mpsc::Sender<RuntimeMessage>,
    pub broadcast_tx: broadcast::Sender<SessionEvent>,
    pub cancel: CancellationToken,
}

/// Manager for all live sessions
pub struct SessionManager {
    catalog: Arc<TopicCatalog>,
    gateway: Arc<dyn CompletionGateway>,
    settings: RuntimeSettings,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new(
        catalog: Arc<TopicCatalog>,
        gateway: Arc<dyn CompletionGateway>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            catalog,
            gateway,
            settings,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a session at the first question of `topic_id`
    pub async fn create(&self, topic_id: &str) -> Result<SessionView, SessionError> {
        let topic = self.catalog.find_topic(topic_id).map_err(|e| match e {
            CatalogError::TopicNotFound(id) => SessionError::TopicNotFound(id),
            other => SessionError::InvalidTransition(other.to_string()),
        })?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(session_id.clone(), topic);

        let (tx, rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let cancel = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            context,
            Arc::clone(&self.gateway),
            RuntimeChannels {
                tx: tx.clone(),
                rx,
                broadcast_tx: broadcast_tx.clone(),
                cancel: cancel.clone(),
            },
        )
        .with_rng(self.settings.rng())
        .with_idle_timeout(self.settings.idle_timeout);
        let view = runtime.view();

        let live = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                session_id.clone(),
                SessionHandle {
                    tx,
                    broadcast_tx,
                    cancel,
                },
            );
            sessions.len()
        };

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            runtime.run().await;
            sessions.write().await.remove(&session_id);
        });

        tracing::info!(session_id = %view.session_id, topic_id, live, "Session created");
        Ok(view)
    }

    pub async fn submit_answer(&self, id: &str, text: String) -> Result<SessionView, SessionError> {
        self.dispatch(id, Event::SubmitAnswer { text }).await
    }

    pub async fn submit_reflection(
        &self,
        id: &str,
        text: String,
    ) -> Result<SessionView, SessionError> {
        self.dispatch(id, Event::SubmitReflection { text }).await
    }

    pub async fn retry_final_comment(&self, id: &str) -> Result<SessionView, SessionError> {
        self.dispatch(id, Event::RetryVerseComment).await
    }

    pub async fn view(&self, id: &str) -> Result<SessionView, SessionError> {
        let tx = self.sender(id).await?;
        let (reply, rx) = oneshot::channel();
        tx.send(RuntimeMessage::Snapshot { reply })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }

    /// Subscribe to session events, returning the current view as well.
    ///
    /// The receiver is created before the snapshot so no change is missed.
    pub async fn subscribe(
        &self,
        id: &str,
    ) -> Result<(SessionView, broadcast::Receiver<SessionEvent>), SessionError> {
        let receiver = {
            let sessions = self.sessions.read().await;
            let handle = sessions
                .get(id)
                .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))?;
            handle.broadcast_tx.subscribe()
        };
        let view = self.view(id).await?;
        Ok((view, receiver))
    }

    /// Tear a session down, abandoning any pending generation
    pub async fn close(&self, id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))?;
        handle.cancel.cancel();
        tracing::info!(session_id = %id, "Session closed");
        Ok(())
    }

    async fn sender(&self, id: &str) -> Result<mpsc::Sender<RuntimeMessage>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|handle| handle.tx.clone())
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
    }

    async fn dispatch(&self, id: &str, event: Event) -> Result<SessionView, SessionError> {
        let tx = self.sender(id).await?;
        let (reply, rx) = oneshot::channel();
        tx.send(RuntimeMessage::Action { event, reply })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }
}
