//! # colloquy-store
//!
//! Session store and append-only event log on `SQLite`:
//!
//! - **Sessions**: keyed by the (app, user, session) triple, holding a
//!   mergeable JSON state mapping
//! - **Event log**: strictly increasing, gapless per-session sequence numbers,
//!   enforced by a unique index
//! - **`SQLite` backend**: `rusqlite` behind an `r2d2` pool with WAL mode,
//!   repository pattern, embedded versioned migrations
//! - **Facade**: [`SessionStore`] — every write runs in one transaction, so
//!   callers never observe partial state

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use errors::{Result, StoreError};
pub use store::SessionStore;
