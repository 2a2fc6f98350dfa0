//! Event repository — the append-only per-session log.
//!
//! Events are immutable once inserted. Sequence numbers are allocated by the
//! caller inside the append transaction via [`EventRepo::next_sequence`]; the
//! unique `(session, sequence)` index rejects any allocation race.

use colloquy_core::SessionKey;
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::Result;
use crate::row_types::EventRow;

/// Event repository — stateless, every method takes `&Connection`.
pub struct EventRepo;

impl EventRepo {
    /// Insert a single event row.
    pub fn insert(conn: &Connection, row: &EventRow) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO events (id, app_name, user_id, session_id, sequence, timestamp, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.app_name,
                row.user_id,
                row.session_id,
                row.sequence,
                row.timestamp,
                row.content,
            ],
        )?;
        Ok(())
    }

    /// Next sequence number for a session: 0 for an empty log, `MAX + 1`
    /// otherwise.
    pub fn next_sequence(conn: &Connection, key: &SessionKey) -> Result<i64> {
        let max: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events
                 WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
                params![key.app_name, key.user_id, key.session_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.map_or(0, |m| m + 1))
    }

    /// All events for a session in ascending sequence order.
    pub fn get_by_session(conn: &Connection, key: &SessionKey) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, app_name, user_id, session_id, sequence, timestamp, content
             FROM events WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3
             ORDER BY sequence ASC",
        )?;
        let rows = stmt
            .query_map(
                params![key.app_name, key.user_id, key.session_id],
                Self::map_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events with a sequence strictly greater than `after_sequence`.
    pub fn get_since(
        conn: &Connection,
        key: &SessionKey,
        after_sequence: i64,
    ) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, app_name, user_id, session_id, sequence, timestamp, content
             FROM events WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3
               AND sequence > ?4
             ORDER BY sequence ASC",
        )?;
        let rows = stmt
            .query_map(
                params![key.app_name, key.user_id, key.session_id, after_sequence],
                Self::map_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> std::result::Result<EventRow, rusqlite::Error> {
        Ok(EventRow {
            id: row.get(0)?,
            app_name: row.get(1)?,
            user_id: row.get(2)?,
            session_id: row.get(3)?,
            sequence: row.get(4)?,
            timestamp: row.get(5)?,
            content: row.get(6)?,
        })
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::repositories::session::SessionRepo;
    use crate::row_types::SessionRow;

    fn setup() -> (Connection, SessionKey) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();

        let key = SessionKey::new("sample_agent", "u_123", "s_123");
        SessionRepo::insert(
            &conn,
            &SessionRow {
                app_name: key.app_name.clone(),
                user_id: key.user_id.clone(),
                session_id: key.session_id.clone(),
                state: "{}".into(),
                event_count: 0,
                created_at: "t0".into(),
                updated_at: "t0".into(),
            },
        )
        .unwrap();
        (conn, key)
    }

    fn event_row(key: &SessionKey, id: &str, sequence: i64) -> EventRow {
        EventRow {
            id: id.into(),
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            sequence,
            timestamp: "t".into(),
            content: r#"{"role":"user","parts":[{"text":"hi"}]}"#.into(),
        }
    }

    #[test]
    fn next_sequence_starts_at_zero() {
        let (conn, key) = setup();
        assert_eq!(EventRepo::next_sequence(&conn, &key).unwrap(), 0);
    }

    #[test]
    fn next_sequence_increments() {
        let (conn, key) = setup();
        EventRepo::insert(&conn, &event_row(&key, "evt_0", 0)).unwrap();
        assert_eq!(EventRepo::next_sequence(&conn, &key).unwrap(), 1);
        EventRepo::insert(&conn, &event_row(&key, "evt_1", 1)).unwrap();
        assert_eq!(EventRepo::next_sequence(&conn, &key).unwrap(), 2);
    }

    #[test]
    fn next_sequence_is_per_session() {
        let (conn, key) = setup();
        EventRepo::insert(&conn, &event_row(&key, "evt_0", 0)).unwrap();

        let other = SessionKey::new("sample_agent", "u_123", "s_other");
        SessionRepo::insert(
            &conn,
            &SessionRow {
                app_name: other.app_name.clone(),
                user_id: other.user_id.clone(),
                session_id: other.session_id.clone(),
                state: "{}".into(),
                event_count: 0,
                created_at: "t0".into(),
                updated_at: "t0".into(),
            },
        )
        .unwrap();
        assert_eq!(EventRepo::next_sequence(&conn, &other).unwrap(), 0);
    }

    #[test]
    fn duplicate_sequence_rejected() {
        let (conn, key) = setup();
        EventRepo::insert(&conn, &event_row(&key, "evt_0", 0)).unwrap();
        assert!(EventRepo::insert(&conn, &event_row(&key, "evt_dup", 0)).is_err());
    }

    #[test]
    fn insert_without_session_rejected() {
        let (conn, _) = setup();
        let orphan = SessionKey::new("sample_agent", "u_123", "no_such_session");
        assert!(EventRepo::insert(&conn, &event_row(&orphan, "evt_0", 0)).is_err());
    }

    #[test]
    fn get_by_session_orders_by_sequence() {
        let (conn, key) = setup();
        // Insert out of order; read must come back sorted.
        EventRepo::insert(&conn, &event_row(&key, "evt_1", 1)).unwrap();
        EventRepo::insert(&conn, &event_row(&key, "evt_0", 0)).unwrap();
        EventRepo::insert(&conn, &event_row(&key, "evt_2", 2)).unwrap();

        let rows = EventRepo::get_by_session(&conn, &key).unwrap();
        let sequences: Vec<i64> = rows.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn get_since_is_exclusive() {
        let (conn, key) = setup();
        for i in 0..4 {
            EventRepo::insert(&conn, &event_row(&key, &format!("evt_{i}"), i)).unwrap();
        }

        let rows = EventRepo::get_since(&conn, &key, 1).unwrap();
        let sequences: Vec<i64> = rows.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![2, 3]);
    }

    #[test]
    fn empty_log_reads_empty() {
        let (conn, key) = setup();
        assert!(EventRepo::get_by_session(&conn, &key).unwrap().is_empty());
        assert!(EventRepo::get_since(&conn, &key, -1).unwrap().is_empty());
    }
}
