//! `/run` and `/run_sse` — one agent turn, batch or streamed.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive};
use axum::response::Sse;
use axum::Json;
use colloquy_core::Event;
use colloquy_runtime::RunRequest;
use serde_json::json;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

/// `POST /run` — execute the turn to completion, return every event it
/// produced as one ordered array (the user event first).
pub async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let session = request.key.clone();
    let events = state.coordinator.run_batch(request).await?;
    info!(session = %session, events = events.len(), "batch run completed");
    Ok(Json(events))
}

/// `POST /run_sse` — the same turn, each event flushed as its own SSE frame
/// in append order. The stream closes when the turn ends; a run failure is
/// delivered as a final `error`-typed frame.
///
/// Session validation and the busy check happen before the response starts,
/// so `not_found` and `session_busy` still arrive as plain JSON errors.
pub async fn run_sse(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let session = request.key.clone();
    let stream = state.coordinator.run_stream(request)?;
    info!(session = %session, "streaming run started");

    let frames = stream.map(|item| {
        let frame = match item {
            Ok(event) => sse_frame(&event),
            Err(err) => {
                let api = ApiError::from(err);
                SseEvent::default().event("error").data(
                    json!({"kind": api.kind(), "message": api.to_string()}).to_string(),
                )
            }
        };
        Ok(frame)
    });

    let keep_alive =
        KeepAlive::new().interval(Duration::from_secs(state.config.sse_keepalive_secs));
    Ok(Sse::new(frames).keep_alive(keep_alive))
}

fn sse_frame(event: &Event) -> SseEvent {
    match SseEvent::default().id(event.id.as_str()).json_data(event) {
        Ok(frame) => frame,
        // Event is a plain serde struct; this arm exists for the signature.
        Err(err) => SseEvent::default()
            .event("error")
            .data(json!({"kind": "internal", "message": err.to_string()}).to_string()),
    }
}
