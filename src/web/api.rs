//! REST API endpoints

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kinefield_cloud::ShapeKind;

use crate::control::valid_hex_color;
use crate::media;
use crate::output::sse;
use crate::session::SessionPhase;
use crate::AppState;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        })
    }

    pub fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub session: SessionPhase,
    pub shape: String,
    pub color: String,
    pub expansion: f32,
    pub tension: f32,
    /// Milliseconds since the last accepted remote control sample
    pub age_ms: u64,
    pub particles: usize,
    pub version: String,
}

/// Get current status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let control = state.get_control_state().await;
    let particles = state.config.read().await.particles.count;

    ApiResponse::success(StatusResponse {
        connected: state.session.is_open(),
        session: state.session.phase(),
        shape: control.shape().name().to_string(),
        color: control.color().to_string(),
        expansion: control.expansion(),
        tension: control.tension(),
        age_ms: control.ms_since_update(),
        particles,
        version: crate::VERSION.to_string(),
    })
}

/// Control update request; absent fields keep their current value
#[derive(Debug, Deserialize)]
pub struct ControlUpdate {
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub expansion: Option<f32>,
    #[serde(default)]
    pub tension: Option<f32>,
}

pub async fn update_control(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ControlUpdate>,
) -> impl IntoResponse {
    let mut control = state.get_control_state().await;

    if let Some(ref shape) = update.shape {
        match ShapeKind::from_name(shape) {
            Some(kind) => control = control.with_shape(kind),
            None => return ApiResponse::error(&format!("Unknown shape: {}", shape)),
        }
    }
    if let Some(color) = update.color {
        if !valid_hex_color(&color) {
            return ApiResponse::error(&format!("Invalid color: {}", color));
        }
        control = control.with_color(color);
    }
    if let Some(expansion) = update.expansion {
        control = control.with_expansion(expansion);
    }
    if let Some(tension) = update.tension {
        control = control.with_tension(tension);
    }

    state.update_control_state(control).await;
    ApiResponse::<()>::ok()
}

/// Open the streaming session
pub async fn connect_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.session.connect(&state).await {
        Ok(()) => ApiResponse::<()>::ok(),
        Err(e) => ApiResponse::error(&e.to_string()),
    }
}

/// Close the streaming session
pub async fn disconnect_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let closed = state.session.disconnect().await;
    ApiResponse::success(serde_json::json!({ "closed": closed }))
}

/// List the shape library
pub async fn list_shapes() -> impl IntoResponse {
    let shapes: Vec<&str> = ShapeKind::ALL.iter().map(|s| s.name()).collect();
    ApiResponse::success(serde_json::json!({ "shapes": shapes }))
}

/// List available audio input devices
pub async fn list_audio_devices() -> impl IntoResponse {
    let devices = media::list_input_devices();
    let default = media::default_input_device_name();

    ApiResponse::success(serde_json::json!({
        "devices": devices,
        "default": default,
    }))
}

/// SSE stream endpoint
pub async fn state_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse::create_state_stream(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_update_allows_partial_fields() {
        let update: ControlUpdate =
            serde_json::from_str(r#"{"expansion": 0.4}"#).unwrap();
        assert_eq!(update.expansion, Some(0.4));
        assert!(update.shape.is_none());
        assert!(update.color.is_none());
        assert!(update.tension.is_none());
    }

    #[test]
    fn test_status_response_shape() {
        let status = StatusResponse {
            connected: false,
            session: SessionPhase::Idle,
            shape: "Heart".to_string(),
            color: "#3b82f6".to_string(),
            expansion: 0.8,
            tension: 0.0,
            age_ms: 120,
            particles: 8000,
            version: "0.1.0".to_string(),
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["session"], "idle");
        assert_eq!(value["shape"], "Heart");
        assert_eq!(value["particles"], 8000);
    }

    #[test]
    fn test_error_response_skips_data() {
        let Json(response) = ApiResponse::error("bad input");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "bad input");
        assert!(value.get("data").is_none());
    }
}
