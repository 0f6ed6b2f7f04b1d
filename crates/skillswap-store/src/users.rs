//! CRUD operations for [`User`] records.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use skillswap_shared::UserId;

use crate::database::Database;
use crate::error::{not_found_on_no_rows, Result};
use crate::models::User;
use crate::sessions::{parse_ts, parse_user};

impl Database {
    /// Insert a user, or update the display name of an existing one.
    pub fn upsert_user(&self, id: &UserId, display_name: Option<&str>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
            params![id.as_str(), display_name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Insert a user with no display name unless they already exist.
    /// Returns `true` if the account was created.
    pub fn ensure_user(&self, id: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO users (id, display_name, created_at) VALUES (?1, NULL, ?2)",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, display_name, created_at FROM users WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok(User {
                        id: parse_user(row, 0)?,
                        display_name: row.get(1)?,
                        created_at: parse_ts(row, 2)?,
                    })
                },
            )
            .map_err(not_found_on_no_rows)
    }

    pub fn user_exists(&self, id: &UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
