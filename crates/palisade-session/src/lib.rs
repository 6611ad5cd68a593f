//! Session management for Palisade rooms.
//!
//! This crate sits between a room and the sockets of the people playing in
//! it:
//!
//! 1. **Identity**: turning a client token into a stable [`Identity`]
//!    ([`IdentityProvider`] trait)
//! 2. **Seating**: binding identities to the room's players
//!    ([`SessionManager::register_player`])
//! 3. **Reconnection**: swapping in a new socket for a dropped one and
//!    replaying unanswered requests ([`SessionManager::reconnect`],
//!    [`SessionManager::resend_pending`])
//! 4. **Delivery**: single sends, concurrent broadcast, and
//!    request/reply ([`SessionManager::ask`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← drives the game, asks players for moves
//!     ↕
//! Session Layer (this crate)  ← identities, seats, inbound queues, replay
//!     ↕
//! Socket (below)  ← anything implementing [`Socket`]
//! ```
//!
//! [`Identity`]: palisade_protocol::Identity

mod auth;
mod error;
mod manager;
mod socket;

pub use auth::{IdentityProvider, MAX_TOKEN_LEN, SessionTokenProvider, generate_identity};
pub use error::SessionError;
pub use manager::SessionManager;
pub use socket::{Inbound, Socket};
