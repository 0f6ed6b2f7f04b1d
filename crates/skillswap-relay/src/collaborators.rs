//! Interfaces to the systems the relay consults but does not own.

use async_trait::async_trait;

use skillswap_shared::{SessionId, UserId};

use crate::error::RelayError;

/// Answers "are these two users mutually connected".
#[async_trait]
pub trait FriendshipOracle: Send + Sync {
    async fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool, RelayError>;
}

/// Persistent call sessions.
///
/// `create_session` is only called after `find_open_session_for_pair`
/// returned `None`; implementations should still refuse a second open
/// session for a pair with [`RelayError::Conflict`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_open_session_for_pair(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<SessionId>, RelayError>;

    async fn create_session(&self, a: &UserId, b: &UserId) -> Result<SessionId, RelayError>;

    /// Both participants, or `None` for an unknown session.
    async fn session_participants(
        &self,
        id: SessionId,
    ) -> Result<Option<[UserId; 2]>, RelayError>;
}
