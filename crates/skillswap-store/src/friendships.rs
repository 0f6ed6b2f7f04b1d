//! Mutual friendships. A pair is stored once, in canonical order, so the
//! lookup is symmetric by construction.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use skillswap_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Friend;
use crate::sessions::{parse_ts, parse_user};

impl Database {
    /// Record a friendship. Returns `false` if the pair were already friends.
    pub fn add_friendship(&self, a: &UserId, b: &UserId) -> Result<bool> {
        if a == b {
            return Err(StoreError::Validation(
                "a user cannot befriend themselves".into(),
            ));
        }
        let (lo, hi) = UserId::ordered_pair(a, b);
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO friendships (user_lo, user_hi, created_at)
             VALUES (?1, ?2, ?3)",
            params![lo.as_str(), hi.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Remove a friendship. Returns `true` if a row was deleted.
    pub fn remove_friendship(&self, a: &UserId, b: &UserId) -> Result<bool> {
        let (lo, hi) = UserId::ordered_pair(a, b);
        let affected = self.conn().execute(
            "DELETE FROM friendships WHERE user_lo = ?1 AND user_hi = ?2",
            params![lo.as_str(), hi.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Whether `a` and `b` are mutually connected. Nobody is their own friend.
    pub fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool> {
        if a == b {
            return Ok(false);
        }
        let (lo, hi) = UserId::ordered_pair(a, b);
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM friendships WHERE user_lo = ?1 AND user_hi = ?2",
                params![lo.as_str(), hi.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Everyone `user` is friends with, oldest friendship first.
    pub fn list_friends(&self, user: &UserId) -> Result<Vec<Friend>> {
        let mut stmt = self.conn().prepare(
            "SELECT f.other, u.display_name, f.created_at
             FROM (
                 SELECT user_hi AS other, created_at FROM friendships WHERE user_lo = ?1
                 UNION ALL
                 SELECT user_lo AS other, created_at FROM friendships WHERE user_hi = ?1
             ) f
             LEFT JOIN users u ON u.id = f.other
             ORDER BY f.created_at ASC, f.other ASC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok(Friend {
                id: parse_user(row, 0)?,
                display_name: row.get(1)?,
                friended_at: parse_ts(row, 2)?,
            })
        })?;

        let mut friends = Vec::new();
        for row in rows {
            friends.push(row?);
        }
        Ok(friends)
    }
}
