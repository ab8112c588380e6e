//! Route definitions for the control API

use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::AppState;

use super::api;

/// Create the main router with all routes
pub fn create_router(app_state: Arc<AppState>, config: &HttpConfig) -> Router {
    let cors = if config.cors_enabled {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter(|origin| *origin != "*")
            .filter_map(|origin| origin.parse().ok())
            .collect();

        if origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        // Control API (JSON)
        .route("/api/status", get(api::get_status))
        .route("/api/control", post(api::update_control))
        .route("/api/shapes", get(api::list_shapes))
        .route("/api/audio/devices", get(api::list_audio_devices))
        // Session lifecycle
        .route("/api/session/connect", post(api::connect_session))
        .route("/api/session/disconnect", post(api::disconnect_session))
        // SSE stream of control-state updates
        .route("/api/stream", get(api::state_stream))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
