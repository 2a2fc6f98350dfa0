//! Database row types mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw row shape — JSON columns stay as strings here.
//! Conversion to the public `colloquy-core` types happens in the facade.

use colloquy_core::{Event, EventId, Message, Session, SessionKey};
use serde_json::{Map, Value};

use crate::errors::Result;

/// Raw session row from the `sessions` table.
#[derive(Clone, Debug)]
pub struct SessionRow {
    /// Application namespace.
    pub app_name: String,
    /// User within the application.
    pub user_id: String,
    /// Session within the user.
    pub session_id: String,
    /// State mapping as a JSON object string.
    pub state: String,
    /// Number of appended events.
    pub event_count: i64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last write timestamp (RFC 3339).
    pub updated_at: String,
}

impl SessionRow {
    /// Convert to the public [`Session`] type, parsing the state column.
    pub fn into_session(self) -> Result<Session> {
        let state: Map<String, Value> = serde_json::from_str(&self.state)?;
        Ok(Session {
            key: SessionKey::new(self.app_name, self.user_id, self.session_id),
            state,
            event_count: self.event_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw event row from the `events` table.
#[derive(Clone, Debug)]
pub struct EventRow {
    /// Event ID.
    pub id: String,
    /// Application namespace.
    pub app_name: String,
    /// User within the application.
    pub user_id: String,
    /// Session within the user.
    pub session_id: String,
    /// Sequence number within the session.
    pub sequence: i64,
    /// Append timestamp (RFC 3339).
    pub timestamp: String,
    /// Message content as a JSON string.
    pub content: String,
}

impl EventRow {
    /// Convert to the public [`Event`] type, parsing the content column.
    pub fn into_event(self) -> Result<Event> {
        let content: Message = serde_json::from_str(&self.content)?;
        Ok(Event {
            id: EventId::from_string(self.id),
            session: SessionKey::new(self.app_name, self.user_id, self.session_id),
            sequence: self.sequence,
            timestamp: self.timestamp,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn session_row_parses_state() {
        let row = SessionRow {
            app_name: "a".into(),
            user_id: "u".into(),
            session_id: "s".into(),
            state: r#"{"key1":"value1","key2":42}"#.into(),
            event_count: 3,
            created_at: "t0".into(),
            updated_at: "t1".into(),
        };
        let session = row.into_session().unwrap();
        assert_eq!(session.key, SessionKey::new("a", "u", "s"));
        assert_eq!(session.state["key2"], 42);
        assert_eq!(session.event_count, 3);
    }

    #[test]
    fn session_row_rejects_corrupt_state() {
        let row = SessionRow {
            app_name: "a".into(),
            user_id: "u".into(),
            session_id: "s".into(),
            state: "not json".into(),
            event_count: 0,
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        assert_matches!(row.into_session(), Err(crate::StoreError::Serde(_)));
    }

    #[test]
    fn event_row_parses_content() {
        let row = EventRow {
            id: "evt_1".into(),
            app_name: "a".into(),
            user_id: "u".into(),
            session_id: "s".into(),
            sequence: 0,
            timestamp: "t".into(),
            content: r#"{"role":"user","parts":[{"text":"hello"}]}"#.into(),
        };
        let event = row.into_event().unwrap();
        assert_eq!(event.sequence, 0);
        assert_eq!(event.content.text(), "hello");
        assert!(event.is_user());
    }
}
