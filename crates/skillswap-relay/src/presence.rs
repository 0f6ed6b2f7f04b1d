use std::collections::HashMap;

use tokio::task::AbortHandle;
use tracing::debug;

use skillswap_shared::protocol::{FromUser, ServerEvent, UserStatus};
use skillswap_shared::UserId;

use crate::hub::{ConnectionContext, Hub};

struct TypingTimer {
    generation: u64,
    handle: AbortHandle,
}

/// One auto-stop timer per (typist, recipient) pair.
///
/// Each re-arm bumps the generation; a timer only fires a stop if its
/// generation is still the current one for the pair.
#[derive(Default)]
pub(crate) struct TypingTimers {
    timers: HashMap<(UserId, UserId), TypingTimer>,
    generation: u64,
}

impl TypingTimers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn arm(&mut self, key: (UserId, UserId), generation: u64, handle: AbortHandle) {
        if let Some(previous) = self.timers.insert(key, TypingTimer { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Remove the pair's timer if `generation` is still current.
    fn expire(&mut self, key: &(UserId, UserId), generation: u64) -> bool {
        match self.timers.get(key) {
            Some(timer) if timer.generation == generation => {
                self.timers.remove(key);
                true
            }
            _ => false,
        }
    }

    fn cancel(&mut self, key: &(UserId, UserId)) -> bool {
        match self.timers.remove(key) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.timers.len()
    }
}

impl Hub {
    /// Tell `to` that the sender is typing and (re)arm the automatic stop.
    pub(crate) fn typing(&self, ctx: &ConnectionContext, to: UserId) {
        self.send_to_user(
            &to,
            ServerEvent::Typing(FromUser {
                from: ctx.user.clone(),
            }),
        );

        let window = self.inner.config.typing_timeout;
        let key = (ctx.user.clone(), to);

        let mut timers = self.inner.typing.lock();
        let generation = timers.next_generation();
        let hub = self.clone();
        let expiring = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            hub.typing_expired(&expiring, generation);
        })
        .abort_handle();
        timers.arm(key, generation, handle);
    }

    fn typing_expired(&self, key: &(UserId, UserId), generation: u64) {
        if !self.inner.typing.lock().expire(key, generation) {
            return;
        }
        let (from, to) = key;
        debug!(from = %from, to = %to, "Typing indicator expired");
        self.send_to_user(to, ServerEvent::TypingStop(FromUser { from: from.clone() }));
    }

    /// Explicit stop: cancel the pending timer and notify right away.
    pub(crate) fn typing_stop(&self, ctx: &ConnectionContext, to: UserId) {
        let key = (ctx.user.clone(), to);
        self.inner.typing.lock().cancel(&key);
        let (from, to) = key;
        self.send_to_user(&to, ServerEvent::TypingStop(FromUser { from }));
    }

    /// Answer a presence query on the asking connection only.
    pub(crate) fn check_online(&self, ctx: &ConnectionContext, target: UserId) {
        let online = self.is_online(&target);
        self.send_to_connection(
            ctx.connection,
            ServerEvent::UserStatus(UserStatus {
                user_id: target,
                online,
            }),
        );
    }
}
