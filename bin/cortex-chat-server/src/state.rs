//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use cortex_chat_core::CompletionClient;
use minijinja::Environment;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::session::GenerationParams;

/// State shared across all HTTP handlers. Read-only after startup.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persistent message store.
    pub store: Arc<SqliteStore>,
    /// Cortex completion client with the options fallback.
    pub completion: CompletionClient,
    /// Page templates.
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    /// Generation settings for a request, filling gaps from the config.
    pub fn generation_params(
        &self,
        model: Option<String>,
        temperature: Option<f32>,
    ) -> GenerationParams {
        GenerationParams {
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.config.default_model.clone()),
            temperature: temperature.unwrap_or(self.config.default_temperature),
            max_turns: self.config.max_turns,
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_state(
    service: Arc<dyn cortex_chat_core::CompletionService>,
) -> Arc<AppState> {
    let store = SqliteStore::in_memory().await.expect("in-memory store");
    Arc::new(AppState {
        config: Arc::new(crate::config::test_config()),
        store: Arc::new(store),
        completion: CompletionClient::new(service),
        templates: Arc::new(crate::templates::environment()),
    })
}
