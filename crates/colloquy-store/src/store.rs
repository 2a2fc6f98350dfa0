//! High-level transactional [`SessionStore`] facade.
//!
//! Composes the session and event repositories into atomic, session-centric
//! methods. Every write runs inside a single `SQLite` transaction — callers
//! never observe partial state, and appends to the same session serialize on
//! the transaction while other sessions proceed through the pool.

use colloquy_core::{now_rfc3339, Event, EventId, Message, Session, SessionKey};
use serde_json::{Map, Value};
use tracing::debug;

use crate::connection::{ConnectionPool, PooledConnection};
use crate::errors::{Result, StoreError};
use crate::repositories::{EventRepo, SessionRepo};
use crate::row_types::{EventRow, SessionRow};

/// Session store and event log over a connection pool.
pub struct SessionStore {
    pool: ConnectionPool,
}

impl SessionStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a session, its state initialized from `initial_state` (empty if
    /// omitted). Fails with [`StoreError::SessionAlreadyExists`] if the triple
    /// is taken.
    pub fn create(
        &self,
        key: &SessionKey,
        initial_state: Option<Map<String, Value>>,
    ) -> Result<Session> {
        validate_key(key)?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if SessionRepo::get(&tx, key)?.is_some() {
            return Err(StoreError::SessionAlreadyExists(key.to_string()));
        }

        let now = now_rfc3339();
        let row = SessionRow {
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            state: serde_json::to_string(&initial_state.unwrap_or_default())?,
            event_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        // The primary key backs up the existence check under write races.
        SessionRepo::insert(&tx, &row).map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::SessionAlreadyExists(key.to_string())
            } else {
                e
            }
        })?;
        tx.commit()?;

        debug!(session = %key, "session created");
        row.into_session()
    }

    /// Get a session by key. Fails with [`StoreError::SessionNotFound`] if
    /// absent.
    pub fn get(&self, key: &SessionKey) -> Result<Session> {
        let conn = self.conn()?;
        SessionRepo::get(&conn, key)?
            .ok_or_else(|| StoreError::SessionNotFound(key.to_string()))?
            .into_session()
    }

    /// Merge `partial_state` into the session's state: each key overwrites or
    /// inserts; untouched keys survive. Atomic — concurrent merges on the same
    /// session serialize on the transaction (last writer wins per key).
    pub fn merge_state(
        &self,
        key: &SessionKey,
        partial_state: Map<String, Value>,
    ) -> Result<Session> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let row = SessionRepo::get(&tx, key)?
            .ok_or_else(|| StoreError::SessionNotFound(key.to_string()))?;
        let mut state: Map<String, Value> = serde_json::from_str(&row.state)?;
        state.extend(partial_state);

        let now = now_rfc3339();
        let _ = SessionRepo::update_state(&tx, key, &serde_json::to_string(&state)?, &now)?;
        tx.commit()?;

        Ok(Session {
            key: key.clone(),
            state,
            event_count: row.event_count,
            created_at: row.created_at,
            updated_at: now,
        })
    }

    /// Delete a session and, via cascade, its entire event log. Returns
    /// whether a session was removed.
    pub fn delete(&self, key: &SessionKey) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = SessionRepo::delete(&conn, key)?;
        if deleted {
            debug!(session = %key, "session deleted");
        }
        Ok(deleted)
    }

    /// List sessions for an (app, user) pair.
    pub fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        SessionRepo::list(&conn, app_name, user_id)?
            .into_iter()
            .map(SessionRow::into_session)
            .collect()
    }

    /// Total sessions in the store, across all apps and users.
    pub fn session_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count = SessionRepo::count(&conn)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event log
    // ─────────────────────────────────────────────────────────────────────

    /// Append a message to the session's log.
    ///
    /// One transaction: the session must exist, the next sequence is read as
    /// `MAX + 1` (0 for an empty log), the event is inserted, and the
    /// session's event count and `updated_at` are bumped. The unique
    /// `(session, sequence)` index makes double allocation impossible.
    pub fn append(&self, key: &SessionKey, message: &Message) -> Result<Event> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        if SessionRepo::get(&tx, key)?.is_none() {
            return Err(StoreError::SessionNotFound(key.to_string()));
        }

        let sequence = EventRepo::next_sequence(&tx, key)?;
        let now = now_rfc3339();
        let row = EventRow {
            id: EventId::new().into_inner(),
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            sequence,
            timestamp: now.clone(),
            content: serde_json::to_string(message)?,
        };

        EventRepo::insert(&tx, &row)?;
        let _ = SessionRepo::increment_event_count(&tx, key, 1, &now)?;
        tx.commit()?;

        debug!(session = %key, sequence, role = %message.role, "event appended");
        row.into_event()
    }

    /// Full history of a session in ascending sequence order.
    ///
    /// Reads only committed events — an append in flight on another
    /// connection is invisible until its transaction commits, so repeated
    /// reads return a consistent, growing prefix. The read is restartable
    /// from any sequence via [`Self::events_since`]. Materialized eagerly:
    /// histories are conversation-sized and the query is one indexed scan,
    /// so a lazy cursor would only pin a pool connection for longer.
    pub fn history(&self, key: &SessionKey) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::get_by_session(&conn, key)?
            .into_iter()
            .map(EventRow::into_event)
            .collect()
    }

    /// Events with sequence strictly greater than `after_sequence`.
    pub fn events_since(&self, key: &SessionKey, after_sequence: i64) -> Result<Vec<Event>> {
        let conn = self.conn()?;
        EventRepo::get_since(&conn, key, after_sequence)?
            .into_iter()
            .map(EventRow::into_event)
            .collect()
    }
}

fn validate_key(key: &SessionKey) -> Result<()> {
    if key.is_valid() {
        Ok(())
    } else {
        Err(StoreError::InvalidOperation(format!(
            "session key components must be non-empty, got '{key}'"
        )))
    }
}

fn is_unique_violation(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::connection::{self, ConnectionConfig};
    use crate::migrations::run_migrations;

    fn setup() -> SessionStore {
        let config = ConnectionConfig {
            pool_size: 1,
            ..ConnectionConfig::default()
        };
        let pool = connection::new_in_memory(&config).unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
        }
        SessionStore::new(pool)
    }

    fn key() -> SessionKey {
        SessionKey::new("sample_agent", "u_123", "s_123")
    }

    fn state(value: serde_json::Value) -> Map<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    // ── Session lifecycle ─────────────────────────────────────────────

    #[test]
    fn create_with_initial_state() {
        let store = setup();
        let session = store
            .create(&key(), Some(state(json!({"key1": "value1", "key2": 42}))))
            .unwrap();

        assert_eq!(session.key, key());
        assert_eq!(session.state["key1"], "value1");
        assert_eq!(session.state["key2"], 42);
        assert_eq!(session.event_count, 0);
    }

    #[test]
    fn create_without_state_starts_empty() {
        let store = setup();
        let session = store.create(&key(), None).unwrap();
        assert!(session.state.is_empty());
    }

    #[test]
    fn duplicate_create_fails_already_exists() {
        let store = setup();
        store.create(&key(), None).unwrap();
        assert_matches!(
            store.create(&key(), None),
            Err(StoreError::SessionAlreadyExists(_))
        );
    }

    #[test]
    fn create_rejects_empty_key_components() {
        let store = setup();
        let bad = SessionKey::new("", "u", "s");
        assert_matches!(
            store.create(&bad, None),
            Err(StoreError::InvalidOperation(_))
        );
    }

    #[test]
    fn get_returns_created_state() {
        let store = setup();
        store
            .create(&key(), Some(state(json!({"key1": "value1", "key2": 42}))))
            .unwrap();

        let session = store.get(&key()).unwrap();
        assert_eq!(session.state["key1"], "value1");
        assert_eq!(session.state["key2"], 42);
    }

    #[test]
    fn get_missing_fails_not_found() {
        let store = setup();
        assert_matches!(store.get(&key()), Err(StoreError::SessionNotFound(_)));
    }

    #[test]
    fn delete_removes_session_and_events() {
        let store = setup();
        store.create(&key(), None).unwrap();
        store.append(&key(), &Message::user("hello")).unwrap();

        assert!(store.delete(&key()).unwrap());
        assert_matches!(store.get(&key()), Err(StoreError::SessionNotFound(_)));
        assert!(store.history(&key()).unwrap().is_empty());
        assert!(!store.delete(&key()).unwrap());
    }

    #[test]
    fn list_scopes_to_app_and_user() {
        let store = setup();
        store.create(&key(), None).unwrap();
        store
            .create(&SessionKey::new("sample_agent", "u_123", "s_2"), None)
            .unwrap();
        store
            .create(&SessionKey::new("other_app", "u_123", "s_123"), None)
            .unwrap();

        let sessions = store.list("sample_agent", "u_123").unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.key.app_name == "sample_agent"));
    }

    #[test]
    fn session_count_tracks_creates_and_deletes() {
        let store = setup();
        assert_eq!(store.session_count().unwrap(), 0);
        store.create(&key(), None).unwrap();
        store
            .create(&SessionKey::new("other_app", "u_9", "s_9"), None)
            .unwrap();
        assert_eq!(store.session_count().unwrap(), 2);
        assert!(store.delete(&key()).unwrap());
        assert_eq!(store.session_count().unwrap(), 1);
    }

    // ── State merge ───────────────────────────────────────────────────

    #[test]
    fn merge_overwrites_and_inserts_only_named_keys() {
        let store = setup();
        store
            .create(&key(), Some(state(json!({"key1": "value1", "key2": 42}))))
            .unwrap();

        let merged = store
            .merge_state(&key(), state(json!({"key2": 43, "key3": true})))
            .unwrap();
        assert_eq!(merged.state["key1"], "value1");
        assert_eq!(merged.state["key2"], 43);
        assert_eq!(merged.state["key3"], true);

        // Persisted, not just returned.
        let got = store.get(&key()).unwrap();
        assert_eq!(got.state["key2"], 43);
    }

    #[test]
    fn merge_is_last_writer_wins_per_key() {
        let store = setup();
        store.create(&key(), None).unwrap();

        store
            .merge_state(&key(), state(json!({"a": 1, "b": 1})))
            .unwrap();
        store.merge_state(&key(), state(json!({"b": 2}))).unwrap();
        store.merge_state(&key(), state(json!({"a": 3}))).unwrap();

        let got = store.get(&key()).unwrap();
        assert_eq!(got.state["a"], 3);
        assert_eq!(got.state["b"], 2);
    }

    #[test]
    fn merge_on_missing_session_fails_not_found() {
        let store = setup();
        assert_matches!(
            store.merge_state(&key(), Map::new()),
            Err(StoreError::SessionNotFound(_))
        );
    }

    // ── Event log ─────────────────────────────────────────────────────

    #[test]
    fn append_assigns_sequence_from_zero() {
        let store = setup();
        store.create(&key(), None).unwrap();

        let first = store.append(&key(), &Message::user("hello")).unwrap();
        let second = store.append(&key(), &Message::agent("hi there")).unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert!(first.id.as_str().starts_with("evt_"));
    }

    #[test]
    fn append_to_missing_session_fails_with_no_side_effects() {
        let store = setup();
        assert_matches!(
            store.append(&key(), &Message::user("hello")),
            Err(StoreError::SessionNotFound(_))
        );
        assert!(store.history(&key()).unwrap().is_empty());
    }

    #[test]
    fn append_bumps_event_count() {
        let store = setup();
        store.create(&key(), None).unwrap();
        store.append(&key(), &Message::user("a")).unwrap();
        store.append(&key(), &Message::agent("b")).unwrap();

        assert_eq!(store.get(&key()).unwrap().event_count, 2);
    }

    #[test]
    fn history_is_gapless_and_ascending() {
        let store = setup();
        store.create(&key(), None).unwrap();
        for i in 0..5 {
            store
                .append(&key(), &Message::user(format!("msg {i}")))
                .unwrap();
        }

        let history = store.history(&key()).unwrap();
        assert_eq!(history.len(), 5);
        for (i, event) in history.iter().enumerate() {
            assert_eq!(event.sequence, i as i64);
        }
    }

    #[test]
    fn repeated_history_reads_return_consistent_prefix() {
        let store = setup();
        store.create(&key(), None).unwrap();
        store.append(&key(), &Message::user("a")).unwrap();

        let before = store.history(&key()).unwrap();
        store.append(&key(), &Message::agent("b")).unwrap();
        let after = store.history(&key()).unwrap();

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after[..before.len()], &before[..]);
    }

    #[test]
    fn sequences_are_independent_across_sessions() {
        let store = setup();
        let other = SessionKey::new("sample_agent", "u_123", "s_other");
        store.create(&key(), None).unwrap();
        store.create(&other, None).unwrap();

        store.append(&key(), &Message::user("a")).unwrap();
        store.append(&key(), &Message::user("b")).unwrap();
        let first_other = store.append(&other, &Message::user("c")).unwrap();

        assert_eq!(first_other.sequence, 0);
    }

    #[test]
    fn sequence_continues_after_reload() {
        // Reissuing runs against the same session must continue the index
        // sequence, not restart at 0.
        let store = setup();
        store.create(&key(), None).unwrap();
        store.append(&key(), &Message::user("turn 1")).unwrap();
        store.append(&key(), &Message::agent("reply 1")).unwrap();

        let next = store.append(&key(), &Message::user("turn 2")).unwrap();
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn events_since_returns_strict_suffix() {
        let store = setup();
        store.create(&key(), None).unwrap();
        for i in 0..4 {
            store
                .append(&key(), &Message::user(format!("msg {i}")))
                .unwrap();
        }

        let tail = store.events_since(&key(), 1).unwrap();
        let sequences: Vec<i64> = tail.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }

    #[test]
    fn appended_content_roundtrips() {
        let store = setup();
        store.create(&key(), None).unwrap();
        let message = Message::user("Hey whats the weather in new york today");
        store.append(&key(), &message).unwrap();

        let history = store.history(&key()).unwrap();
        assert_eq!(history[0].content, message);
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colloquy.db");
        let config = ConnectionConfig::default();

        {
            let pool = connection::new_file(path.to_str().unwrap(), &config).unwrap();
            run_migrations(&pool.get().unwrap()).unwrap();
            let store = SessionStore::new(pool);
            store.create(&key(), None).unwrap();
            store.append(&key(), &Message::user("durable")).unwrap();
        }

        let pool = connection::new_file(path.to_str().unwrap(), &config).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        let store = SessionStore::new(pool);

        let history = store.history(&key()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content.text(), "durable");
    }
}
