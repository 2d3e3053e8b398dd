//! Bible Dive - guided Bible study service
//!
//! A Rust backend that walks a participant through a topic's questions,
//! answering each with generated encouragement and closing with a
//! verse-linked reflection.

mod api;
mod catalog;
mod config;
mod gateway;
mod llm;
mod prompt;
mod reveal;
mod runtime;
mod session;

use api::{create_router, AppState};
use catalog::TopicCatalog;
use config::AppConfig;
use gateway::{CompletionGateway, LlmGateway};
use llm::ModelRegistry;
use runtime::RuntimeSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bible_dive=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Load the topic catalog
    let catalog = match &config.catalog_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading topic catalog");
            TopicCatalog::load(path)?
        }
        None => TopicCatalog::bundled()?,
    };
    tracing::info!(
        topics = catalog.topic_count(),
        categories = catalog.categories().len(),
        "Topic catalog loaded"
    );

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));
    if llm_registry.has_models() {
        tracing::info!(models = ?llm_registry.available_models(), "LLM registry initialized");
    } else {
        tracing::warn!("No LLM API keys configured. Set OPENAI_API_KEY or LLM_GATEWAY.");
    }

    let gateway: Arc<dyn CompletionGateway> = Arc::new(
        LlmGateway::new(llm_registry, config.generation_timeout).with_retry(config.retry),
    );

    // Create application state
    let state = AppState::new(
        Arc::new(catalog),
        gateway,
        RuntimeSettings {
            verse_seed: config.verse_seed,
            idle_timeout: config.session_idle_timeout,
        },
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Bible Dive server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
