//! v002 -- Friend requests and call ratings.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Friend requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    id          TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    sender_id   TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    user_lo     TEXT NOT NULL,               -- canonical pair, for the pending index
    user_hi     TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    CHECK (sender_id <> receiver_id)
);

-- One pending request per pair, whichever side sent it.
CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_pending_pair
    ON friend_requests(user_lo, user_hi) WHERE status = 'pending';

CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
    ON friend_requests(receiver_id, status);

-- ----------------------------------------------------------------
-- Call ratings (one per session)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS call_ratings (
    id                 TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    session_id         TEXT NOT NULL UNIQUE,
    rater_id           TEXT NOT NULL,
    ratee_id           TEXT NOT NULL,
    rating             INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
    feedback           TEXT,
    call_duration_secs INTEGER NOT NULL DEFAULT 0,
    call_quality       TEXT NOT NULL DEFAULT 'Good'
        CHECK (call_quality IN ('Excellent', 'Good', 'Fair', 'Poor')),
    issues             TEXT NOT NULL DEFAULT '["None"]',   -- JSON array
    created_at         TEXT NOT NULL,

    FOREIGN KEY (session_id) REFERENCES call_sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_call_ratings_rater ON call_ratings(rater_id);
CREATE INDEX IF NOT EXISTS idx_call_ratings_ratee ON call_ratings(ratee_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
