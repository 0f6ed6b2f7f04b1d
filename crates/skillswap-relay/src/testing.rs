//! In-memory collaborators and helpers shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use skillswap_shared::protocol::{
    AcceptedCall, CallErrorCode, CallTarget, ClientEvent, JoinSession, ServerEvent, SessionRef,
};
use skillswap_shared::{SessionId, UserId};

use crate::collaborators::{FriendshipOracle, SessionStore};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::hub::{ConnectionContext, Hub};

pub(crate) fn uid(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

struct MemorySession {
    participants: [UserId; 2],
    open: bool,
}

/// Friend graph and session table in one place.
#[derive(Default)]
pub(crate) struct MemoryDirectory {
    friends: Mutex<HashSet<(UserId, UserId)>>,
    sessions: Mutex<HashMap<SessionId, MemorySession>>,
    created: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryDirectory {
    fn key(a: &UserId, b: &UserId) -> (UserId, UserId) {
        let (lo, hi) = UserId::ordered_pair(a, b);
        (lo.clone(), hi.clone())
    }

    pub(crate) fn befriend(&self, a: &str, b: &str) {
        self.friends.lock().insert(Self::key(&uid(a), &uid(b)));
    }

    pub(crate) fn unfriend(&self, a: &str, b: &str) {
        self.friends.lock().remove(&Self::key(&uid(a), &uid(b)));
    }

    /// Insert an already-open session without counting it as created.
    pub(crate) fn open_session(&self, a: &str, b: &str) -> SessionId {
        let id = SessionId::new();
        self.sessions.lock().insert(
            id,
            MemorySession {
                participants: [uid(a), uid(b)],
                open: true,
            },
        );
        id
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Unavailable("directory offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FriendshipOracle for MemoryDirectory {
    async fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool, RelayError> {
        self.check()?;
        Ok(a != b && self.friends.lock().contains(&Self::key(a, b)))
    }
}

#[async_trait]
impl SessionStore for MemoryDirectory {
    async fn find_open_session_for_pair(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<SessionId>, RelayError> {
        self.check()?;
        Ok(self
            .sessions
            .lock()
            .iter()
            .find(|(_, s)| s.open && s.participants.contains(a) && s.participants.contains(b))
            .map(|(id, _)| *id))
    }

    async fn create_session(&self, a: &UserId, b: &UserId) -> Result<SessionId, RelayError> {
        self.check()?;
        let id = SessionId::new();
        self.sessions.lock().insert(
            id,
            MemorySession {
                participants: [a.clone(), b.clone()],
                open: true,
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn session_participants(
        &self,
        id: SessionId,
    ) -> Result<Option<[UserId; 2]>, RelayError> {
        self.check()?;
        Ok(self
            .sessions
            .lock()
            .get(&id)
            .map(|s| s.participants.clone()))
    }
}

pub(crate) fn fixture() -> (Hub, Arc<MemoryDirectory>) {
    fixture_with(RelayConfig::default())
}

pub(crate) fn fixture_with(config: RelayConfig) -> (Hub, Arc<MemoryDirectory>) {
    let dir = Arc::new(MemoryDirectory::default());
    let hub = Hub::new(config, dir.clone(), dir.clone());
    (hub, dir)
}

pub(crate) fn connect_as(
    hub: &Hub,
    name: &str,
) -> (ConnectionContext, mpsc::Receiver<ServerEvent>) {
    let (tx, rx) = hub.outbox();
    (hub.connect(uid(name), tx), rx)
}

/// Everything queued for a connection right now.
pub(crate) fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub(crate) fn initiate(to: &str) -> ClientEvent {
    ClientEvent::CallInitiate(CallTarget { to: uid(to) })
}

pub(crate) fn join_event(session_id: SessionId, peer: &str) -> ClientEvent {
    ClientEvent::CallJoin(JoinSession {
        session_id,
        peer_id: uid(peer),
    })
}

pub(crate) fn end_event(session_id: SessionId) -> ClientEvent {
    ClientEvent::CallEnd(SessionRef { session_id })
}

pub(crate) fn call_error(code: CallErrorCode) -> ServerEvent {
    ServerEvent::CallError(code.into())
}

pub(crate) fn accepted(events: &[ServerEvent]) -> AcceptedCall {
    events
        .iter()
        .find_map(|e| match e {
            ServerEvent::CallAccepted(a) => Some(a.clone()),
            _ => None,
        })
        .expect("no call:accepted delivered")
}
