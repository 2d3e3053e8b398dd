//! HTTP API for the study service

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::catalog::TopicCatalog;
use crate::gateway::CompletionGateway;
use crate::runtime::{RuntimeSettings, SessionManager};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub catalog: Arc<TopicCatalog>,
    pub gateway: Arc<dyn CompletionGateway>,
}

impl AppState {
    pub fn new(
        catalog: Arc<TopicCatalog>,
        gateway: Arc<dyn CompletionGateway>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(
                Arc::clone(&catalog),
                Arc::clone(&gateway),
                settings,
            )),
            catalog,
            gateway,
        }
    }
}
