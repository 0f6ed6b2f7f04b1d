use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use skillswap_shared::protocol::{
    AcceptedCall, CallErrorCode, CallRef, ClosedCall, IncomingCall, JoinSession, ServerEvent,
    UserJoined,
};
use skillswap_shared::{CallId, ConnectionId, SessionId, UserId};

use crate::error::RelayError;
use crate::hub::{ConnectionContext, Hub};

/// A call that is ringing and has not been settled yet.
pub(crate) struct PendingCall {
    pub(crate) caller: UserId,
    pub(crate) callee: UserId,
    pub(crate) created_at: DateTime<Utc>,
    timer: AbortHandle,
}

impl PendingCall {
    fn involves(&self, user: &UserId) -> bool {
        &self.caller == user || &self.callee == user
    }
}

/// Ringing calls by id.
///
/// A call leaves this table exactly once, through [`PendingCalls::settle`].
/// Whichever of accept, reject or timeout gets there first wins; the others
/// find nothing and do nothing.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: HashMap<CallId, PendingCall>,
    seq: u64,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, caller: &UserId, callee: &UserId, at: DateTime<Utc>) -> CallId {
        self.seq += 1;
        CallId::for_attempt(caller, callee, at, self.seq)
    }

    fn insert(&mut self, call_id: CallId, call: PendingCall) {
        self.calls.insert(call_id, call);
    }

    fn get(&self, call_id: &CallId) -> Option<&PendingCall> {
        self.calls.get(call_id)
    }

    /// Remove the call and stop its ring timer.
    fn settle(&mut self, call_id: &CallId) -> Option<PendingCall> {
        let call = self.calls.remove(call_id)?;
        call.timer.abort();
        Some(call)
    }

    fn involving(&self, user: &UserId) -> Vec<CallId> {
        self.calls
            .iter()
            .filter(|(_, call)| call.involves(user))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}

impl Hub {
    pub(crate) async fn initiate_call(&self, ctx: &ConnectionContext, to: UserId) {
        if to == ctx.user {
            self.call_error(ctx.connection, CallErrorCode::NotFriends);
            return;
        }

        match self.inner.friends.are_friends(&ctx.user, &to).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(caller = %ctx.user, callee = %to, "Call refused: not friends");
                self.call_error(ctx.connection, CallErrorCode::NotFriends);
                return;
            }
            Err(e) => {
                warn!(caller = %ctx.user, callee = %to, error = %e, "Friendship lookup failed");
                self.call_error(ctx.connection, CallErrorCode::InitiateFailed);
                return;
            }
        }

        if !self.is_online(&to) {
            self.call_error(ctx.connection, CallErrorCode::UserOffline);
            return;
        }

        let call_id = self.ring(&ctx.user, &to);

        self.send_to_user(
            &to,
            ServerEvent::CallIncoming(IncomingCall {
                from: ctx.user.clone(),
                call_id: call_id.clone(),
            }),
        );
        self.send_to_connection(ctx.connection, ServerEvent::CallInitiated(CallRef::new(call_id)));
    }

    /// Record a pending call and arm its ring timer.
    fn ring(&self, caller: &UserId, callee: &UserId) -> CallId {
        let ring_timeout = self.inner.config.ring_timeout;
        let now = Utc::now();

        let mut calls = self.inner.calls.lock();
        let call_id = calls.next_id(caller, callee, now);

        let hub = self.clone();
        let expiring = call_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ring_timeout).await;
            hub.expire_call(&expiring);
        })
        .abort_handle();

        calls.insert(
            call_id.clone(),
            PendingCall {
                caller: caller.clone(),
                callee: callee.clone(),
                created_at: now,
                timer,
            },
        );

        info!(
            call = %call_id,
            caller = %caller,
            callee = %callee,
            ringing = calls.len(),
            "Call ringing"
        );
        call_id
    }

    fn expire_call(&self, call_id: &CallId) {
        let Some(call) = self.inner.calls.lock().settle(call_id) else {
            return;
        };
        info!(call = %call_id, caller = %call.caller, callee = %call.callee, "Call timed out");

        let event = ServerEvent::CallTimeout(ClosedCall {
            call_id: call_id.clone(),
            by: None,
        });
        self.send_to_user(&call.caller, event.clone());
        self.send_to_user(&call.callee, event);
    }

    pub(crate) async fn accept_call(&self, ctx: &ConnectionContext, call_id: CallId) {
        let call = {
            let mut calls = self.inner.calls.lock();
            match calls.get(&call_id).map(|c| c.callee == ctx.user) {
                Some(true) => calls.settle(&call_id),
                Some(false) => {
                    warn!(call = %call_id, user = %ctx.user, "Accept from someone other than the callee");
                    None
                }
                None => {
                    debug!(call = %call_id, "Accept for unknown or settled call");
                    None
                }
            }
        };
        let Some(call) = call else {
            return;
        };

        let rang_for = Utc::now() - call.created_at;
        debug!(call = %call_id, ms = rang_for.num_milliseconds(), "Call answered");

        // The friendship may have ended while the call was ringing.
        match self.inner.friends.are_friends(&call.caller, &call.callee).await {
            Ok(true) => {}
            Ok(false) => {
                self.call_error_to_both(&call, CallErrorCode::NotFriends);
                return;
            }
            Err(e) => {
                warn!(call = %call_id, error = %e, "Friendship lookup failed during accept");
                self.call_error_to_both(&call, CallErrorCode::AcceptFailed);
                return;
            }
        }

        let session_id = match self.open_session_for(&call.caller, &call.callee).await {
            Ok(id) => id,
            Err(e) => {
                warn!(call = %call_id, error = %e, "Could not open call session");
                self.call_error_to_both(&call, CallErrorCode::AcceptFailed);
                return;
            }
        };

        info!(call = %call_id, session = %session_id, "Call accepted");

        self.send_to_user(
            &call.caller,
            ServerEvent::CallAccepted(AcceptedCall {
                call_id: call_id.clone(),
                session_id,
                peer_id: call.callee.clone(),
            }),
        );
        self.send_to_user(
            &call.callee,
            ServerEvent::CallAccepted(AcceptedCall {
                call_id,
                session_id,
                peer_id: call.caller.clone(),
            }),
        );
    }

    /// Find the pair's open session, or create one. At most one accept runs
    /// this at a time.
    async fn open_session_for(&self, a: &UserId, b: &UserId) -> Result<SessionId, RelayError> {
        let _gate = self.inner.session_gate.lock().await;
        let sessions = &self.inner.sessions;

        if let Some(existing) = sessions.find_open_session_for_pair(a, b).await? {
            debug!(session = %existing, "Reusing open session");
            return Ok(existing);
        }

        match sessions.create_session(a, b).await {
            Ok(created) => Ok(created),
            // Another process opened one between our lookup and insert.
            Err(RelayError::Conflict(reason)) => sessions
                .find_open_session_for_pair(a, b)
                .await?
                .ok_or(RelayError::Conflict(reason)),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn reject_call(&self, ctx: &ConnectionContext, call_id: CallId) {
        let call = {
            let mut calls = self.inner.calls.lock();
            match calls.get(&call_id).map(|c| c.involves(&ctx.user)) {
                Some(true) => calls.settle(&call_id),
                Some(false) => {
                    warn!(call = %call_id, user = %ctx.user, "Reject from outside the call");
                    None
                }
                None => None,
            }
        };
        let Some(call) = call else {
            return;
        };

        info!(call = %call_id, by = %ctx.user, "Call rejected");
        self.announce_rejection(call_id, &call, &ctx.user);
    }

    /// Settle every ringing call involving `user` as rejected by them.
    pub(crate) fn cancel_ringing(&self, user: &UserId) {
        let settled: Vec<(CallId, PendingCall)> = {
            let mut calls = self.inner.calls.lock();
            calls
                .involving(user)
                .into_iter()
                .filter_map(|id| calls.settle(&id).map(|call| (id, call)))
                .collect()
        };

        for (call_id, call) in settled {
            info!(call = %call_id, user = %user, "Ringing call cancelled by disconnect");
            self.announce_rejection(call_id, &call, user);
        }
    }

    fn announce_rejection(&self, call_id: CallId, call: &PendingCall, by: &UserId) {
        let event = ServerEvent::CallRejected(ClosedCall {
            call_id,
            by: Some(by.clone()),
        });
        self.send_to_user(&call.caller, event.clone());
        self.send_to_user(&call.callee, event);
    }

    pub(crate) async fn join_session(&self, ctx: &ConnectionContext, join: JoinSession) {
        if !self.are_friends(&ctx.user, &join.peer_id).await {
            debug!(user = %ctx.user, peer = %join.peer_id, "Join refused: not friends");
            return;
        }
        if !self.is_participant(join.session_id, &ctx.user).await {
            warn!(user = %ctx.user, session = %join.session_id, "Join refused: not a participant");
            return;
        }

        self.inner.rooms.lock().join(join.session_id, ctx.connection);
        self.broadcast_to_room(
            &join.session_id,
            ServerEvent::CallUserJoined(UserJoined {
                user_id: ctx.user.clone(),
            }),
        );
    }

    pub(crate) async fn end_session(&self, ctx: &ConnectionContext, session_id: SessionId) {
        if !self.is_participant(session_id, &ctx.user).await {
            debug!(user = %ctx.user, session = %session_id, "End ignored: not a participant");
            return;
        }
        info!(user = %ctx.user, session = %session_id, "Call ended");
        self.broadcast_to_room(&session_id, ServerEvent::CallEnd);
    }

    fn call_error(&self, connection: ConnectionId, code: CallErrorCode) {
        self.send_to_connection(connection, ServerEvent::CallError(code.into()));
    }

    fn call_error_to_both(&self, call: &PendingCall, code: CallErrorCode) {
        let event = ServerEvent::CallError(code.into());
        self.send_to_user(&call.caller, event.clone());
        self.send_to_user(&call.callee, event);
    }
}
