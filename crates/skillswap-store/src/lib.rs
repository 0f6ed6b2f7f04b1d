//! # skillswap-store
//!
//! SQLite persistence for the records the call relay consults but does not
//! own: user accounts, friendships and friend requests, call sessions with
//! their shared notes, and call ratings.
//!
//! The crate exposes a synchronous `Database` handle wrapping a
//! `rusqlite::Connection`, with typed helpers split per table.

pub mod database;
pub mod friend_requests;
pub mod friendships;
pub mod migrations;
pub mod models;
pub mod notes;
pub mod ratings;
pub mod sessions;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
