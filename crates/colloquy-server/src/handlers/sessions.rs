//! Session REST endpoints under `/apps/{app}/users/{user}/sessions`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use colloquy_core::{Event, Session, SessionKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

/// Optional body for session creation.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionBody {
    /// Initial state mapping, defaults to empty.
    #[serde(default)]
    pub state: Option<Map<String, Value>>,
}

/// A session together with its full event history, for GET responses.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    /// The session record.
    #[serde(flatten)]
    pub session: Session,
    /// Every event in ascending sequence order.
    pub events: Vec<Event>,
}

/// `POST /apps/{app_name}/users/{user_id}/sessions/{session_id}`
pub async fn create_session(
    State(state): State<AppState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
    body: Option<Json<CreateSessionBody>>,
) -> Result<Json<Session>, ApiError> {
    let key = SessionKey::new(app_name, user_id, session_id);
    let initial_state = body.and_then(|Json(b)| b.state);
    let session = state.store.create(&key, initial_state)?;
    info!(session = %key, "session created");
    Ok(Json(session))
}

/// `GET /apps/{app_name}/users/{user_id}/sessions/{session_id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Result<Json<SessionDetail>, ApiError> {
    let key = SessionKey::new(app_name, user_id, session_id);
    let session = state.store.get(&key)?;
    let events = state.store.history(&key)?;
    Ok(Json(SessionDetail { session, events }))
}

/// `DELETE /apps/{app_name}/users/{user_id}/sessions/{session_id}`
pub async fn delete_session(
    State(state): State<AppState>,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let key = SessionKey::new(app_name, user_id, session_id);
    if state.store.delete(&key)? {
        info!(session = %key, "session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session not found: {key}")))
    }
}

/// `GET /apps/{app_name}/users/{user_id}/sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
    Path((app_name, user_id)): Path<(String, String)>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state.store.list(&app_name, &user_id)?;
    Ok(Json(sessions))
}
