//! Session addressing and the session record itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The (app, user, session) triple uniquely addressing a session.
///
/// All three components are opaque, non-empty strings chosen by the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Application namespace.
    pub app_name: String,
    /// User within the application.
    pub user_id: String,
    /// Session within the user.
    pub session_id: String,
}

impl SessionKey {
    /// Build a key from its three components.
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Whether every component is non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.app_name.is_empty() && !self.user_id.is_empty() && !self.session_id.is_empty()
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A durable conversation context: key, mergeable state, and counters.
///
/// The event history lives in the event log, not on this record; only the
/// event count is denormalized here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Addressing triple.
    #[serde(flatten)]
    pub key: SessionKey,
    /// Client-visible state mapping. Keys are merged, never replaced wholesale.
    pub state: Map<String, Value>,
    /// Number of events appended to this session so far.
    pub event_count: i64,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last state merge or event append.
    pub updated_at: String,
}
