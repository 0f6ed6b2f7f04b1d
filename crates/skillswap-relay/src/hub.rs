use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use skillswap_shared::protocol::{ClientEvent, ServerEvent, SignalKind};
use skillswap_shared::{ConnectionId, SessionId, UserId};

use crate::calls::PendingCalls;
use crate::collaborators::{FriendshipOracle, SessionStore};
use crate::config::RelayConfig;
use crate::presence::TypingTimers;
use crate::registry::{ConnectionRegistry, Outbox};
use crate::rooms::SessionRooms;

/// The authenticated identity behind one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    pub user: UserId,
    pub connection: ConnectionId,
}

/// Presence, call and relay state shared by every connection.
///
/// Cheap to clone. Built once at startup and handed to the transport; nothing
/// in here is global.
#[derive(Clone)]
pub struct Hub {
    pub(crate) inner: Arc<HubInner>,
}

pub(crate) struct HubInner {
    pub(crate) config: RelayConfig,
    pub(crate) registry: Mutex<ConnectionRegistry>,
    pub(crate) rooms: Mutex<SessionRooms>,
    pub(crate) calls: Mutex<PendingCalls>,
    pub(crate) typing: Mutex<TypingTimers>,
    /// Serializes find-or-create of open sessions across accepts.
    pub(crate) session_gate: tokio::sync::Mutex<()>,
    pub(crate) friends: Arc<dyn FriendshipOracle>,
    pub(crate) sessions: Arc<dyn SessionStore>,
}

impl Hub {
    pub fn new(
        config: RelayConfig,
        friends: Arc<dyn FriendshipOracle>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                registry: Mutex::new(ConnectionRegistry::new()),
                rooms: Mutex::new(SessionRooms::new()),
                calls: Mutex::new(PendingCalls::new()),
                typing: Mutex::new(TypingTimers::new()),
                session_gate: tokio::sync::Mutex::new(()),
                friends,
                sessions,
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// A fresh outbound queue sized for one connection.
    pub fn outbox(&self) -> (Outbox, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(self.inner.config.outbox_capacity.max(1))
    }

    /// Register an authenticated connection.
    ///
    /// The new connection receives the online snapshot; everybody else hears
    /// `user:online` only if this is the user's first device.
    pub fn connect(&self, user: UserId, outbox: Outbox) -> ConnectionContext {
        let connection = ConnectionId::new();
        let mut registry = self.inner.registry.lock();
        let registration = registry.register(user.clone(), connection, outbox);

        if let Some(displaced) = registration.displaced {
            registry.broadcast_except(connection, &ServerEvent::UserOffline(displaced));
        }
        registry.send_to_connection(
            connection,
            ServerEvent::UsersOnline(registration.online_users),
        );
        if registration.came_online {
            registry.broadcast_except(connection, &ServerEvent::UserOnline(user.clone()));
        }

        ConnectionContext { user, connection }
    }

    /// Tear down a connection: drop it from the registry and from every
    /// session room. Safe to call more than once.
    pub fn disconnect(&self, ctx: &ConnectionContext) {
        self.inner.rooms.lock().leave_all(&ctx.connection);

        let went_offline = {
            let mut registry = self.inner.registry.lock();
            let went_offline = registry.deregister(&ctx.user, ctx.connection);
            if went_offline {
                registry.broadcast_except(ctx.connection, &ServerEvent::UserOffline(ctx.user.clone()));
            }
            went_offline
        };

        if went_offline {
            info!(user = %ctx.user, "User went offline");
            if self.inner.config.cancel_ringing_on_disconnect {
                self.cancel_ringing(&ctx.user);
            }
        }
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.inner.registry.lock().is_online(user)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.inner.registry.lock().online_users()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.registry.lock().connection_count()
    }

    pub fn pending_call_count(&self) -> usize {
        self.inner.calls.lock().len()
    }

    /// Handle one inbound event. Failures are resolved here: the relay never
    /// hands an error back to the transport.
    pub async fn handle(&self, ctx: &ConnectionContext, event: ClientEvent) {
        debug!(
            user = %ctx.user,
            connection = %ctx.connection.short(),
            event = event.name(),
            "Inbound event"
        );

        match event {
            ClientEvent::CallInitiate(target) => self.initiate_call(ctx, target.to).await,
            ClientEvent::CallAccept(call) => self.accept_call(ctx, call.call_id).await,
            ClientEvent::CallReject(call) => self.reject_call(ctx, call.call_id),
            ClientEvent::CallJoin(join) => self.join_session(ctx, join).await,
            ClientEvent::CallEnd(session) => self.end_session(ctx, session.session_id).await,

            ClientEvent::CallOffer(env) => self.relay_signal(ctx, SignalKind::CallOffer, env).await,
            ClientEvent::CallAnswer(env) => {
                self.relay_signal(ctx, SignalKind::CallAnswer, env).await
            }
            ClientEvent::CallIceCandidate(env) => {
                self.relay_signal(ctx, SignalKind::CallIceCandidate, env).await
            }
            ClientEvent::CallScreenStart(env) => {
                self.relay_signal(ctx, SignalKind::CallScreenStart, env).await
            }
            ClientEvent::CallScreenStop(env) => {
                self.relay_signal(ctx, SignalKind::CallScreenStop, env).await
            }
            ClientEvent::WebrtcOffer(env) => {
                self.relay_signal(ctx, SignalKind::WebrtcOffer, env).await
            }
            ClientEvent::WebrtcAnswer(env) => {
                self.relay_signal(ctx, SignalKind::WebrtcAnswer, env).await
            }
            ClientEvent::WebrtcIceCandidate(env) => {
                self.relay_signal(ctx, SignalKind::WebrtcIceCandidate, env).await
            }

            ClientEvent::WhiteboardStroke(env) => self.relay_stroke(ctx, env).await,
            ClientEvent::WhiteboardClear(scope) => self.relay_clear(ctx, scope).await,
            ClientEvent::NotesUpdate(env) => self.relay_notes(ctx, env).await,

            ClientEvent::Typing(target) => self.typing(ctx, target.to),
            ClientEvent::TypingStop(target) => self.typing_stop(ctx, target.to),
            ClientEvent::CheckOnline(query) => self.check_online(ctx, query.target_user_id),
        }
    }

    // -- shared helpers -----------------------------------------------------

    pub(crate) fn send_to_user(&self, user: &UserId, event: ServerEvent) -> usize {
        self.inner.registry.lock().send_to_user(user, &event)
    }

    pub(crate) fn send_to_connection(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        self.inner.registry.lock().send_to_connection(connection, event)
    }

    /// Deliver to every connection subscribed to the session, sender included.
    pub(crate) fn broadcast_to_room(&self, session_id: &SessionId, event: ServerEvent) -> usize {
        let members = self.inner.rooms.lock().members(session_id);
        if members.is_empty() {
            return 0;
        }
        self.inner
            .registry
            .lock()
            .send_to_connections(&members, &event)
    }

    pub(crate) async fn are_friends(&self, a: &UserId, b: &UserId) -> bool {
        match self.inner.friends.are_friends(a, b).await {
            Ok(friends) => friends,
            Err(e) => {
                warn!(a = %a, b = %b, error = %e, "Friendship lookup failed");
                false
            }
        }
    }

    /// Whether `user` is one of the two participants of the session.
    pub(crate) async fn is_participant(&self, session_id: SessionId, user: &UserId) -> bool {
        match self.inner.sessions.session_participants(session_id).await {
            Ok(Some(participants)) => participants.contains(user),
            Ok(None) => false,
            Err(e) => {
                warn!(session = %session_id, error = %e, "Session lookup failed");
                false
            }
        }
    }
}
