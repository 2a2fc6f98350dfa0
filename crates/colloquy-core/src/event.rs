//! Immutable event records.

use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::message::Message;
use crate::session::SessionKey;

/// One immutable record in a session's append-only log.
///
/// Sequence numbers are assigned by the event log at append time: strictly
/// increasing, gapless, starting at 0, scoped to the owning session. An event
/// is never mutated or removed once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Generated event ID (`evt_` + UUID v7).
    pub id: EventId,
    /// Owning session.
    #[serde(flatten)]
    pub session: SessionKey,
    /// Position in the session's log, starting at 0.
    pub sequence: i64,
    /// RFC 3339 append time.
    pub timestamp: String,
    /// The message this event records.
    pub content: Message,
}

impl Event {
    /// Whether this event records a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.content.role == crate::message::Role::User
    }
}
