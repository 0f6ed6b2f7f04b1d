//! # skillswap-relay
//!
//! Real-time presence and call-signaling core.
//!
//! - **Connection registry**: which users are online and through which
//!   connections
//! - **Call lifecycle**: ring, then accept / reject / timeout, then a
//!   persisted call session
//! - **Signaling and collaboration relay**: room-scoped forwarding of WebRTC
//!   negotiation, whiteboard and notes events between session participants
//! - **Presence and typing**: online/offline broadcasts and self-expiring
//!   typing indicators
//!
//! Everything is owned by a [`Hub`] built once at startup and handed to the
//! transport layer. Persistence and friendship lookups are reached through
//! the traits in [`collaborators`].

mod calls;
mod collab;
pub mod collaborators;
pub mod config;
pub mod error;
mod hub;
mod presence;
pub mod registry;
mod rooms;
mod signaling;

#[cfg(test)]
mod testing;

pub use collaborators::{FriendshipOracle, SessionStore};
pub use config::RelayConfig;
pub use error::RelayError;
pub use hub::{ConnectionContext, Hub};
pub use registry::{ConnectionRegistry, Outbox, Registration};
