use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub const ROOT_MESSAGE: &str = "API is running. Use POST /predict to classify news.";

pub async fn root() -> Json<Value> {
    Json(json!({ "message": ROOT_MESSAGE }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "newsclf-server"
    }))
}

/// `ready` once the classifier is loaded, `fallback` when serving the dummy
/// payload, `loading` while a lazy load has not happened yet.
pub async fn ready_check(State(state): State<AppState>) -> Json<Value> {
    let status = if state.fallback_active() {
        "fallback"
    } else if state.is_loaded() {
        "ready"
    } else {
        "loading"
    };

    Json(json!({
        "status": status,
        "model_loaded": state.is_loaded(),
        "loaded_at": state.loaded_at().map(|t| t.to_rfc3339()),
    }))
}
