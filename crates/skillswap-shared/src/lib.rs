//! Types shared by every skillswap crate: identifiers, the WebSocket wire
//! protocol and a handful of protocol constants.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::SharedError;
pub use types::{CallId, ConnectionId, RecordingStatus, SessionId, UserId};
