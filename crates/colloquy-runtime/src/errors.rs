//! Error types for the run coordinator.

use colloquy_store::StoreError;
use thiserror::Error;

/// Failure reported by a reasoning engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine errored mid-turn.
    #[error("engine failure: {0}")]
    Failure(String),
}

/// Errors that can occur while coordinating a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The run named a session triple that does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Another run is already active on this session.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// The run request itself is malformed.
    #[error("invalid run request: {0}")]
    InvalidRequest(String),

    /// The reasoning engine errored mid-turn. Events appended before the
    /// failure stay committed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The store failed during the run. Events appended before the failure
    /// stay committed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RunError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(key) => Self::SessionNotFound(key),
            other => Self::Store(other),
        }
    }
}
