//! Model registry for managing available LLM providers

use super::{LlmService, OpenAIModel, OpenAIService};
use crate::prompt::PromptKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible gateway URL; the gateway handles authentication
    pub gateway: Option<String>,
    /// Model used for every prompt kind, overriding the per-kind routing
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            gateway: lookup("LLM_GATEWAY").filter(|g| !g.is_empty()),
            default_model: lookup("DEFAULT_MODEL").filter(|m| !m.is_empty()),
        }
    }
}

/// Preferred model for each prompt kind
fn routed_model(kind: PromptKind) -> OpenAIModel {
    match kind {
        PromptKind::QuestionGeneration => OpenAIModel::GPT35Turbo,
        PromptKind::Encouragement | PromptKind::VerseReflection => OpenAIModel::GPT41Mini,
        PromptKind::Chat => OpenAIModel::GPT4,
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: Option<String>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new_empty() -> Self {
        Self {
            services: HashMap::new(),
            default_model: None,
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut registry = Self::new_empty();
        registry.default_model.clone_from(&config.default_model);
        if let Some(id) = &config.default_model {
            if OpenAIModel::from_id(id).is_none() {
                tracing::warn!(model = %id, "DEFAULT_MODEL is not a known model; using per-kind routing");
            }
        }

        // In gateway mode, use "implicit" as the API key
        let api_key = match (&config.gateway, &config.openai_api_key) {
            (Some(_), _) => "implicit".to_string(),
            (None, Some(key)) => key.clone(),
            (None, None) => return registry,
        };

        for model in OpenAIModel::ALL {
            match OpenAIService::new(api_key.clone(), model, config.gateway.as_deref()) {
                Ok(service) => registry.insert(Arc::new(service)),
                Err(e) => {
                    tracing::warn!(model = model.model_id(), error = %e, "Skipping model");
                }
            }
        }

        registry
    }

    /// Register a service under its own model id
    pub fn insert(&mut self, service: Arc<dyn LlmService>) {
        self.services.insert(service.model_id().to_string(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Pick the service for a prompt kind.
    ///
    /// Order: configured default model, the kind's preferred model, then the
    /// first registered model by id.
    pub fn service_for(&self, kind: PromptKind) -> Option<Arc<dyn LlmService>> {
        if let Some(service) = self.default_model.as_deref().and_then(|id| self.get(id)) {
            return Some(service);
        }
        if let Some(service) = self.get(routed_model(kind).model_id()) {
            return Some(service);
        }
        self.available_models()
            .first()
            .and_then(|id| self.get(id))
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
