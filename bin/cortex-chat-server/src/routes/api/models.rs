use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use cortex_chat_core::CortexModel;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models))
}

/// Cortex model ids offered by the UI, default first.
#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    responses(
        (status = 200, description = "Model ids", body = Vec<String>)
    )
)]
pub async fn list_models() -> Json<Vec<String>> {
    Json(CortexModel::ids())
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn lists_the_default_model_first() {
        let Json(models) = list_models().await;
        assert_eq!(models.first().map(String::as_str), Some("mistral-large"));
        assert!(models.iter().any(|m| m == "snowflake-arctic"));
    }
}
