//! Call session records.
//!
//! Participants are stored as a canonical `(user_lo, user_hi)` pair. A
//! partial unique index keeps at most one open (`ended_at IS NULL`) session
//! per pair, so a racing second insert fails with [`StoreError::Conflict`]
//! instead of creating a duplicate.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use skillswap_shared::{RecordingStatus, SessionId, UserId};

use crate::database::Database;
use crate::error::{conflict_on_constraint, not_found_on_no_rows, Result, StoreError};
use crate::models::{CallSession, Recording};

const SESSION_COLUMNS: &str = "id, user_lo, user_hi, started_at, ended_at, recording_status, \
                               recording_url, notes_id, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Open a new session between `a` and `b`.
    pub fn create_session(&self, a: &UserId, b: &UserId) -> Result<CallSession> {
        if a == b {
            return Err(StoreError::Validation(
                "a call session needs two distinct participants".into(),
            ));
        }
        let (lo, hi) = UserId::ordered_pair(a, b);
        let now = Utc::now();
        let session = CallSession {
            id: SessionId::new(),
            participants: [lo.clone(), hi.clone()],
            started_at: now,
            ended_at: None,
            recording: Recording {
                status: RecordingStatus::None,
                url: None,
            },
            notes_id: None,
            created_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO call_sessions
                     (id, user_lo, user_hi, started_at, recording_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id.to_string(),
                    lo.as_str(),
                    hi.as_str(),
                    now.to_rfc3339(),
                    RecordingStatus::None.as_str(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| conflict_on_constraint(e, "Session already exists"))?;

        tracing::debug!(session = %session.id, "created call session");
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_session(&self, id: SessionId) -> Result<CallSession> {
        self.conn()
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM call_sessions WHERE id = ?1"),
                params![id.to_string()],
                row_to_session,
            )
            .map_err(not_found_on_no_rows)
    }

    /// The open session between `a` and `b`, if any.
    pub fn find_open_session_for_pair(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<CallSession>> {
        let (lo, hi) = UserId::ordered_pair(a, b);
        let session = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM call_sessions
                     WHERE user_lo = ?1 AND user_hi = ?2 AND ended_at IS NULL"
                ),
                params![lo.as_str(), hi.as_str()],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Both participants of a session, or `None` if the session is unknown.
    pub fn session_participants(&self, id: SessionId) -> Result<Option<[UserId; 2]>> {
        let pair = self
            .conn()
            .query_row(
                "SELECT user_lo, user_hi FROM call_sessions WHERE id = ?1",
                params![id.to_string()],
                |row| Ok([parse_user(row, 0)?, parse_user(row, 1)?]),
            )
            .optional()?;
        Ok(pair)
    }

    /// Sessions `user` took part in, newest first, plus the total count.
    pub fn sessions_for_user(
        &self,
        user: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<CallSession>, u64)> {
        let total: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM call_sessions WHERE user_lo = ?1 OR user_hi = ?1",
            params![user.as_str()],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM call_sessions
             WHERE user_lo = ?1 OR user_hi = ?1
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![user.as_str(), limit, offset], row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok((sessions, total as u64))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Mark a session as ended. Ending an ended session is a conflict.
    pub fn end_session(&self, id: SessionId) -> Result<CallSession> {
        let affected = self.conn().execute(
            "UPDATE call_sessions SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL",
            params![id.to_string(), Utc::now().to_rfc3339()],
        )?;

        if affected == 0 {
            // Distinguish "unknown" from "already ended".
            self.get_session(id)?;
            return Err(StoreError::Conflict("Session already ended".into()));
        }

        self.get_session(id)
    }

    /// Move the recording to `next`, optionally recording where the asset
    /// lives.
    ///
    /// The server itself never records; this is the entry point for an
    /// external recording worker, and no HTTP route calls it.
    pub fn update_recording_status(
        &self,
        id: SessionId,
        next: RecordingStatus,
        url: Option<&str>,
    ) -> Result<CallSession> {
        let session = self.get_session(id)?;
        let current = session.recording.status;
        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        self.conn().execute(
            "UPDATE call_sessions
             SET recording_status = ?2, recording_url = COALESCE(?3, recording_url)
             WHERE id = ?1",
            params![id.to_string(), next.as_str(), url],
        )?;

        self.get_session(id)
    }

    pub(crate) fn set_notes_ref(&self, id: SessionId, notes_id: Uuid) -> Result<()> {
        self.conn().execute(
            "UPDATE call_sessions SET notes_id = ?2 WHERE id = ?1",
            params![id.to_string(), notes_id.to_string()],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_opt_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub(crate) fn parse_user(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
    let raw: String = row.get(idx)?;
    UserId::new(raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_session_id(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<SessionId> {
    let raw: String = row.get(idx)?;
    SessionId::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Map a `rusqlite::Row` selected with `SESSION_COLUMNS` to a [`CallSession`].
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallSession> {
    let status_raw: String = row.get(5)?;
    let status = RecordingStatus::from_str(&status_raw).map_err(|e| conversion_error(5, e))?;

    let notes_raw: Option<String> = row.get(7)?;
    let notes_id = notes_raw
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| conversion_error(7, e))?;

    Ok(CallSession {
        id: parse_session_id(row, 0)?,
        participants: [parse_user(row, 1)?, parse_user(row, 2)?],
        started_at: parse_ts(row, 3)?,
        ended_at: parse_opt_ts(row, 4)?,
        recording: Recording {
            status,
            url: row.get(6)?,
        },
        notes_id,
        created_at: parse_ts(row, 8)?,
    })
}
