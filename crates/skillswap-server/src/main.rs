//! # skillswap-server
//!
//! Real-time server for SkillSwap.
//!
//! This binary provides:
//! - **WebSocket gateway** carrying presence, typing indicators, the call
//!   lifecycle, WebRTC signaling and whiteboard/notes sync
//! - **REST API** (axum) for friend requests, call sessions and history,
//!   recordings, notes, post-call ratings and the ICE server list
//! - **Per-IP rate limiting** on the REST API

mod api;
mod auth;
mod config;
mod directory;
mod error;
mod friends;
mod gateway;
mod rate_limit;
mod ratings;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skillswap_relay::Hub;
use skillswap_store::Database;

use crate::api::AppState;
use crate::auth::JwtAuthenticator;
use crate::config::ServerConfig;
use crate::directory::StoreDirectory;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,skillswap_server=debug,skillswap_relay=debug")
        }))
        .init();

    info!("Starting SkillSwap server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        http_addr = %config.http_addr,
        database = %config.database_path.display(),
        ring_timeout_secs = config.ring_timeout.as_secs(),
        turn_enabled = config.turn_enabled(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = if config.database_path.as_os_str() == ":memory:" {
        Database::open_in_memory()?
    } else {
        Database::open_at(&config.database_path)?
    };
    let db = Arc::new(Mutex::new(db));

    let directory = Arc::new(StoreDirectory::new(db.clone()));
    let hub = Hub::new(config.relay_config(), directory.clone(), directory);
    let auth = Arc::new(JwtAuthenticator::new(
        config.access_token_secret.as_deref(),
        db.clone(),
    ));
    let rate_limiter = RateLimiter::new(config.api_rate_per_sec, config.api_rate_burst);

    let http_addr = config.http_addr;
    let app_state = AppState {
        hub,
        db,
        auth,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config),
        started_at: Instant::now(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Evict rate-limit buckets idle for more than 10 minutes, every 5 minutes
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(Duration::from_secs(600));
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
