//! Error types for the store subsystem.
//!
//! [`StoreError`] is the single error type returned by all store operations,
//! with specific variants for the failure modes callers branch on
//! (`SessionNotFound`, `SessionAlreadyExists`) and pass-through variants for
//! the backends underneath.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// No session exists under the given triple.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session already exists under the given triple.
    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),

    /// Invalid operation on the store.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
