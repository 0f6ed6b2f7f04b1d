//! SQLite-backed implementations of the relay's collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use skillswap_relay::{FriendshipOracle, RelayError, SessionStore};
use skillswap_shared::{SessionId, UserId};
use skillswap_store::{Database, StoreError};

/// The one database handle, shared by the relay and the REST handlers.
pub type SharedDb = Arc<Mutex<Database>>;

#[derive(Clone)]
pub struct StoreDirectory {
    db: SharedDb,
}

impl StoreDirectory {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

fn relay_error(err: StoreError) -> RelayError {
    match err {
        StoreError::Conflict(reason) => RelayError::Conflict(reason),
        other => RelayError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl FriendshipOracle for StoreDirectory {
    async fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool, RelayError> {
        self.db.lock().await.are_friends(a, b).map_err(relay_error)
    }
}

#[async_trait]
impl SessionStore for StoreDirectory {
    async fn find_open_session_for_pair(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<SessionId>, RelayError> {
        let db = self.db.lock().await;
        let session = db.find_open_session_for_pair(a, b).map_err(relay_error)?;
        Ok(session.map(|s| s.id))
    }

    async fn create_session(&self, a: &UserId, b: &UserId) -> Result<SessionId, RelayError> {
        let db = self.db.lock().await;
        let session = db.create_session(a, b).map_err(relay_error)?;
        tracing::info!(session = %session.id, "Call session opened");
        Ok(session.id)
    }

    async fn session_participants(
        &self,
        id: SessionId,
    ) -> Result<Option<[UserId; 2]>, RelayError> {
        self.db
            .lock()
            .await
            .session_participants(id)
            .map_err(relay_error)
    }
}
