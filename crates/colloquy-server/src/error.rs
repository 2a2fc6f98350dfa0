//! Error-to-status mapping and the uniform JSON error body.
//!
//! Every non-2xx response carries `{"error": {"kind": ..., "message": ...}}`
//! so clients branch on `kind` instead of parsing messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use colloquy_runtime::RunError;
use colloquy_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// API-level error, one variant per response kind.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed session does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A session already exists under the given triple.
    #[error("{0}")]
    AlreadyExists(String),

    /// Another run is active on the addressed session.
    #[error("{0}")]
    SessionBusy(String),

    /// The reasoning engine failed mid-turn.
    #[error("{0}")]
    EngineFailure(String),

    /// The store could not serve the request.
    #[error("{0}")]
    StoreUnavailable(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable kind for the error body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::SessionBusy(_) => "session_busy",
            Self::EngineFailure(_) => "engine_failure",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) | Self::SessionBusy(_) => StatusCode::CONFLICT,
            Self::EngineFailure(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.kind(), error = %self, "request failed");
        }
        let body = json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(key) => Self::NotFound(format!("session not found: {key}")),
            StoreError::SessionAlreadyExists(key) => {
                Self::AlreadyExists(format!("session already exists: {key}"))
            }
            StoreError::InvalidOperation(msg) => Self::BadRequest(msg),
            StoreError::Pool(e) => Self::StoreUnavailable(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::SessionNotFound(key) => Self::NotFound(format!("session not found: {key}")),
            RunError::SessionBusy(key) => {
                Self::SessionBusy(format!("a run is already active on session: {key}"))
            }
            RunError::InvalidRequest(msg) => Self::BadRequest(msg),
            RunError::Engine(e) => Self::EngineFailure(e.to_string()),
            RunError::Store(e) => e.into(),
        }
    }
}
