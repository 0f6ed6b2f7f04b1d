/// How long a call rings before both sides receive `call:timeout`.
pub const DEFAULT_RING_TIMEOUT_SECS: u64 = 45;

/// How long after the last `user:typing` the recipient receives
/// `user:typing:stop`.
pub const DEFAULT_TYPING_TIMEOUT_SECS: u64 = 5;

/// Per-connection outbound queue depth.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Default HTTP/WebSocket port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default STUN server handed to clients when none is configured.
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Prefix of the broadcast scope that groups a call session's connections.
pub const SESSION_ROOM_PREFIX: &str = "call:";
