use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde_json::json;
use tracing::error;

use crate::common::app_state::AppState;

pub fn health_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/detailed", get(health_detailed))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    "OK".into_response()
}

async fn health_detailed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let platform = true;
    let upstream_configured = state.get_gemini().has_api_key();

    let store = state.get_store();
    let store_status = match store.health_check().await {
        Ok(_) => true,
        Err(e) => {
            error!("Failed store health check: {}", e);
            false
        }
    };

    let json = json!({
        "platform": platform,
        "upstream_configured": upstream_configured,
        "store": {
            "kind": store.kind(),
            "healthy": store_status,
        },
    });

    (StatusCode::OK, Json(json))
}
