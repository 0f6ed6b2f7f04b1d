use std::time::Duration;

use skillswap_shared::constants::{
    DEFAULT_OUTBOX_CAPACITY, DEFAULT_RING_TIMEOUT_SECS, DEFAULT_TYPING_TIMEOUT_SECS,
};

/// Tunables of the relay core.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How long a pending call rings before it times out.
    pub ring_timeout: Duration,

    /// Quiet period after the last `user:typing` before the automatic stop.
    pub typing_timeout: Duration,

    /// Depth of each connection's outbound queue. Events for a connection
    /// whose queue is full are dropped.
    pub outbox_capacity: usize,

    /// When a user's last connection closes, settle their ringing calls as
    /// rejected instead of letting them ring out.
    pub cancel_ringing_on_disconnect: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(DEFAULT_RING_TIMEOUT_SECS),
            typing_timeout: Duration::from_secs(DEFAULT_TYPING_TIMEOUT_SECS),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            cancel_ringing_on_disconnect: false,
        }
    }
}
