use skillswap_shared::{RecordingStatus, SharedError};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// The write would violate a uniqueness or state rule, e.g. a second
    /// open session for a pair or ending an ended session.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Recording status change outside the allowed lifecycle.
    #[error("Invalid recording transition: {from} -> {to}")]
    InvalidTransition {
        from: RecordingStatus,
        to: RecordingStatus,
    },

    /// Input rejected before touching the database.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON column encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored identifier failed to parse.
    #[error("Identifier error: {0}")]
    Id(#[from] SharedError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map a constraint violation to [`StoreError::Conflict`], anything else to
/// [`StoreError::Sqlite`].
pub(crate) fn conflict_on_constraint(err: rusqlite::Error, message: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref code, _)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(message.to_string())
        }
        other => StoreError::Sqlite(other),
    }
}

pub(crate) fn not_found_on_no_rows(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}
