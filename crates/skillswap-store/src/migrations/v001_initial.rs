//! v001 -- Initial schema creation.
//!
//! Creates `users`, `friendships`, `call_sessions` and `notes`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- opaque account id
    display_name TEXT,
    created_at   TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Friendships (mutual, stored once in canonical order)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friendships (
    user_lo    TEXT NOT NULL,
    user_hi    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (user_lo, user_hi),
    CHECK (user_lo < user_hi)
);

-- ----------------------------------------------------------------
-- Call sessions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS call_sessions (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_lo          TEXT NOT NULL,
    user_hi          TEXT NOT NULL,
    started_at       TEXT NOT NULL,
    ended_at         TEXT,                        -- NULL while open
    recording_status TEXT NOT NULL DEFAULT 'none'
        CHECK (recording_status IN ('none', 'starting', 'recording', 'processing', 'ready', 'failed')),
    recording_url    TEXT,
    notes_id         TEXT,                        -- FK -> notes(id), set on first write
    created_at       TEXT NOT NULL,

    CHECK (user_lo < user_hi)
);

CREATE INDEX IF NOT EXISTS idx_call_sessions_pair_created
    ON call_sessions(user_lo, user_hi, created_at DESC);

-- At most one open session per pair.
CREATE UNIQUE INDEX IF NOT EXISTS idx_call_sessions_open_pair
    ON call_sessions(user_lo, user_hi) WHERE ended_at IS NULL;

-- ----------------------------------------------------------------
-- Notes (one shared document per session)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notes (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    session_id TEXT NOT NULL,
    content    TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (session_id) REFERENCES call_sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notes_session_id ON notes(session_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
