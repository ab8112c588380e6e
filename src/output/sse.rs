//! Server-Sent Events for real-time control-state updates

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::control::ControlState;
use crate::AppState;

/// Create an SSE stream of control-state updates
pub fn create_state_stream(
    app_state: Arc<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = app_state.subscribe_state();

    // Convert broadcast receiver to a stream
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(state) => Some(Ok(state_to_event(&state))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert a control state to an SSE event
fn state_to_event(state: &ControlState) -> Event {
    let data = serde_json::json!({
        "shape": state.shape().name(),
        "color": state.color(),
        "expansion": state.expansion(),
        "tension": state.tension(),
        "age_ms": state.ms_since_update(),
    });

    Event::default().event("control").data(data.to_string())
}
