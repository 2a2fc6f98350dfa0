//! Session repository — session rows keyed by the (app, user, session) triple.

use colloquy_core::SessionKey;
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::Result;
use crate::row_types::SessionRow;

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session row. The caller checks for duplicates; the primary
    /// key backs that check up with a constraint violation.
    pub fn insert(conn: &Connection, row: &SessionRow) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO sessions (app_name, user_id, session_id, state, event_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.app_name,
                row.user_id,
                row.session_id,
                row.state,
                row.event_count,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a session row by key.
    pub fn get(conn: &Connection, key: &SessionKey) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT app_name, user_id, session_id, state, event_count, created_at, updated_at
                 FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
                params![key.app_name, key.user_id, key.session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Overwrite the state column and bump `updated_at`.
    pub fn update_state(
        conn: &Connection,
        key: &SessionKey,
        state_json: &str,
        updated_at: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET state = ?1, updated_at = ?2
             WHERE app_name = ?3 AND user_id = ?4 AND session_id = ?5",
            params![
                state_json,
                updated_at,
                key.app_name,
                key.user_id,
                key.session_id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Add to the event count and bump `updated_at`.
    pub fn increment_event_count(
        conn: &Connection,
        key: &SessionKey,
        by: i64,
        updated_at: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET event_count = event_count + ?1, updated_at = ?2
             WHERE app_name = ?3 AND user_id = ?4 AND session_id = ?5",
            params![by, updated_at, key.app_name, key.user_id, key.session_id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a session row. Events go with it via the foreign key cascade.
    pub fn delete(conn: &Connection, key: &SessionKey) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
            params![key.app_name, key.user_id, key.session_id],
        )?;
        Ok(changed > 0)
    }

    /// List sessions for an (app, user) pair, most recently updated first.
    pub fn list(conn: &Connection, app_name: &str, user_id: &str) -> Result<Vec<SessionRow>> {
        let mut stmt = conn.prepare(
            "SELECT app_name, user_id, session_id, state, event_count, created_at, updated_at
             FROM sessions WHERE app_name = ?1 AND user_id = ?2
             ORDER BY updated_at DESC, session_id ASC",
        )?;
        let rows = stmt
            .query_map(params![app_name, user_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total session rows across all apps and users.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> std::result::Result<SessionRow, rusqlite::Error> {
        Ok(SessionRow {
            app_name: row.get(0)?,
            user_id: row.get(1)?,
            session_id: row.get(2)?,
            state: row.get(3)?,
            event_count: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}
