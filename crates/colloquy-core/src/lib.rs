//! # colloquy-core
//!
//! Shared vocabulary for the Colloquy agent service:
//!
//! - **Addressing**: [`SessionKey`] — the (app, user, session) triple
//! - **Content**: [`Message`], [`Part`], [`Role`] — the conversation wire format
//! - **History**: [`Event`] — immutable, sequence-numbered log records
//! - **IDs**: branded newtypes over UUID v7 with entity prefixes
//!
//! This crate does no I/O; everything here is plain data with serde contracts.

#![deny(unsafe_code)]

pub mod event;
pub mod ids;
pub mod message;
pub mod session;

pub use event::Event;
pub use ids::{EventId, RunId};
pub use message::{FunctionCall, FunctionResponse, Message, Part, Role};
pub use session::{Session, SessionKey};

/// Current RFC 3339 timestamp, the canonical time format on the wire and in
/// the store.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
