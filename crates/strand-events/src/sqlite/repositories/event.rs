//! Event repository: the append-only log.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;
use crate::sqlite::row_types::EventRow;
use crate::types::Event;

/// Event repository.
pub struct EventRepo;

impl EventRepo {
    /// Insert `event` at `sequence` for a session.
    pub fn insert(conn: &Connection, session_key: i64, sequence: i64, event: &Event) -> Result<()> {
        let content = serde_json::to_string(event.content())?;
        let actions = serde_json::to_string(event.actions())?;
        let _ = conn.execute(
            "INSERT INTO events (event_id, session_key, sequence, invocation_id, timestamp,
             author, content, actions, branch, is_final_response)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id().as_str(),
                session_key,
                sequence,
                event.invocation_id().as_str(),
                event.timestamp(),
                event.author(),
                content,
                actions,
                event.branch(),
                event.is_final_response(),
            ],
        )?;
        Ok(())
    }

    /// Next commit sequence for a session (1 for an empty log).
    pub fn next_sequence(conn: &Connection, session_key: i64) -> Result<i64> {
        let max: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events WHERE session_key = ?1",
                params![session_key],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.unwrap_or(0) + 1)
    }

    /// Timestamp of the newest event in a session's log.
    pub fn last_timestamp(conn: &Connection, session_key: i64) -> Result<Option<f64>> {
        Ok(conn
            .query_row(
                "SELECT timestamp FROM events WHERE session_key = ?1
                 ORDER BY sequence DESC LIMIT 1",
                params![session_key],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Whether a session's log holds `event_id`.
    pub fn exists(conn: &Connection, session_key: i64, event_id: &str) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM events WHERE event_id = ?1 AND session_key = ?2",
                params![event_id, session_key],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    /// Full log for a session in commit order.
    pub fn list_for_session(conn: &Connection, session_key: i64) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "SELECT event_id, sequence, invocation_id, timestamp, author, content, actions,
                    branch, is_final_response
             FROM events WHERE session_key = ?1 ORDER BY sequence ASC",
        )?;
        let rows = stmt
            .query_map(params![session_key], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of events in a session's log.
    pub fn count(conn: &Connection, session_key: i64) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM events WHERE session_key = ?1",
            params![session_key],
            |row| row.get(0),
        )?)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
        Ok(EventRow {
            event_id: row.get(0)?,
            sequence: row.get(1)?,
            invocation_id: row.get(2)?,
            timestamp: row.get(3)?,
            author: row.get(4)?,
            content: row.get(5)?,
            actions: row.get(6)?,
            branch: row.get(7)?,
            is_final_response: row.get(8)?,
        })
    }
}
