// Public API for reusable components

pub mod api;
pub mod config;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Re-export commonly used types
pub use config::{Args, ServerConfig};
pub use state::AppState;

/// Build the HTTP router with every endpoint and middleware.
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config.http.enable_cors;

    let app = Router::new()
        .route("/", get(api::health::root))
        .route("/predict", post(api::predict::predict))
        // Health & status
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::ready_check))
        .with_state(state);

    let app = if enable_cors {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}
