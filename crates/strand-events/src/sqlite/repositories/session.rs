//! Session repository: session rows and their rewind pointer.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;
use crate::sqlite::row_types::SessionRow;
use crate::types::{SessionKey, SessionMeta};

const COLUMNS: &str = "session_key, app_name, user_id, session_id, active_from_event_id, \
                       branch, created_at, updated_at";

/// Session repository.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a session row, returning its internal key. Fails with a
    /// constraint error if the identity triple exists.
    pub fn insert(conn: &Connection, meta: &SessionMeta) -> Result<i64> {
        let _ = conn.execute(
            "INSERT INTO sessions (app_name, user_id, session_id, active_from_event_id,
             branch, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                meta.key.app_name,
                meta.key.user_id,
                meta.key.session_id.as_str(),
                meta.active_from.as_ref().map(|id| id.as_str()),
                meta.branch,
                meta.created_at,
                meta.last_update_time,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a session by identity.
    pub fn get(conn: &Connection, key: &SessionKey) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM sessions
                     WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3"
                ),
                params![key.app_name, key.user_id, key.session_id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Sessions for an app/user pair, oldest first.
    pub fn list(conn: &Connection, app_name: &str, user_id: &str) -> Result<Vec<SessionRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE app_name = ?1 AND user_id = ?2
             ORDER BY created_at ASC, session_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![app_name, user_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Set the update time.
    pub fn touch(conn: &Connection, session_key: i64, updated_at: f64) -> Result<()> {
        let _ = conn.execute(
            "UPDATE sessions SET updated_at = ?2 WHERE session_key = ?1",
            params![session_key, updated_at],
        )?;
        Ok(())
    }

    /// Point the session at a new rewind marker and branch.
    pub fn set_branch(
        conn: &Connection,
        session_key: i64,
        active_from: &str,
        branch: &str,
    ) -> Result<()> {
        let _ = conn.execute(
            "UPDATE sessions SET active_from_event_id = ?2, branch = ?3 WHERE session_key = ?1",
            params![session_key, active_from, branch],
        )?;
        Ok(())
    }

    /// Delete a session row; its events go with it via `ON DELETE CASCADE`.
    pub fn delete(conn: &Connection, key: &SessionKey) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
            params![key.app_name, key.user_id, key.session_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            session_key: row.get(0)?,
            app_name: row.get(1)?,
            user_id: row.get(2)?,
            session_id: row.get(3)?,
            active_from_event_id: row.get(4)?,
            branch: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
