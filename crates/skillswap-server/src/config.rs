//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use skillswap_relay::RelayConfig;
use skillswap_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_OUTBOX_CAPACITY, DEFAULT_RING_TIMEOUT_SECS, DEFAULT_STUN_URL,
    DEFAULT_TYPING_TIMEOUT_SECS,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) server, WebSocket included.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// SQLite database file. `:memory:` keeps everything in RAM.
    /// Env: `DATABASE_PATH`
    /// Default: `./skillswap.db`
    pub database_path: PathBuf,

    /// HMAC secret for access tokens. Without it every connection is refused.
    /// Env: `ACCESS_TOKEN_SECRET`
    pub access_token_secret: Option<String>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Allowed browser origins. Empty means any origin.
    /// Env: `CLIENT_ORIGINS` (comma separated)
    pub client_origins: Vec<String>,

    /// Env: `ICE_STUN_URLS` (comma separated)
    pub stun_urls: Vec<String>,

    /// TURN relays, only advertised when credentials are configured too.
    /// Env: `ICE_TURN_URLS`, `TURN_USER`, `TURN_PASSWORD`
    pub turn_urls: Vec<String>,
    pub turn_user: Option<String>,
    pub turn_password: Option<String>,

    /// Env: `CALL_RING_TIMEOUT_SECS`
    pub ring_timeout: Duration,

    /// Env: `TYPING_TIMEOUT_SECS`
    pub typing_timeout: Duration,

    /// Per-connection outbound queue depth.
    /// Env: `OUTBOX_CAPACITY`
    pub outbox_capacity: usize,

    /// Settle ringing calls as rejected when a party's last connection drops.
    /// Env: `CANCEL_RINGING_ON_DISCONNECT` (true/false)
    /// Default: `false`
    pub cancel_ringing_on_disconnect: bool,

    /// Sustained REST requests per second per client IP.
    /// Env: `API_RATE_PER_SEC`
    pub api_rate_per_sec: f64,

    /// Env: `API_RATE_BURST`
    pub api_rate_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./skillswap.db"),
            access_token_secret: None,
            instance_name: "SkillSwap".to_string(),
            client_origins: Vec::new(),
            stun_urls: vec![DEFAULT_STUN_URL.to_string()],
            turn_urls: Vec::new(),
            turn_user: None,
            turn_password: None,
            ring_timeout: Duration::from_secs(DEFAULT_RING_TIMEOUT_SECS),
            typing_timeout: Duration::from_secs(DEFAULT_TYPING_TIMEOUT_SECS),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            cancel_ringing_on_disconnect: false,
            api_rate_per_sec: 2.0,
            api_rate_burst: 120.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(secret) = lookup("ACCESS_TOKEN_SECRET") {
            if !secret.is_empty() {
                config.access_token_secret = Some(secret);
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(origins) = lookup("CLIENT_ORIGINS") {
            config.client_origins = split_list(&origins);
        }

        if let Some(urls) = lookup("ICE_STUN_URLS") {
            config.stun_urls = split_list(&urls);
        }
        if let Some(urls) = lookup("ICE_TURN_URLS") {
            config.turn_urls = split_list(&urls);
        }
        config.turn_user = lookup("TURN_USER").filter(|v| !v.is_empty());
        config.turn_password = lookup("TURN_PASSWORD").filter(|v| !v.is_empty());

        if let Some(secs) = parse_var::<u64>(&lookup, "CALL_RING_TIMEOUT_SECS") {
            config.ring_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TYPING_TIMEOUT_SECS") {
            config.typing_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "OUTBOX_CAPACITY") {
            config.outbox_capacity = n.max(1);
        }

        if let Some(val) = lookup("CANCEL_RINGING_ON_DISCONNECT") {
            config.cancel_ringing_on_disconnect = val == "true" || val == "1";
        }

        if let Some(rate) = parse_var::<f64>(&lookup, "API_RATE_PER_SEC") {
            config.api_rate_per_sec = rate;
        }
        if let Some(burst) = parse_var::<f64>(&lookup, "API_RATE_BURST") {
            config.api_rate_burst = burst;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            ring_timeout: self.ring_timeout,
            typing_timeout: self.typing_timeout,
            outbox_capacity: self.outbox_capacity,
            cancel_ringing_on_disconnect: self.cancel_ringing_on_disconnect,
        }
    }

    /// TURN is only usable with both URLs and credentials.
    pub fn turn_enabled(&self) -> bool {
        !self.turn_urls.is_empty() && self.turn_user.is_some() && self.turn_password.is_some()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
