//! Room orchestration for Palisade.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! [`Game`](palisade_engine::Game) and one
//! [`SessionManager`](palisade_session::SessionManager). It seats players,
//! drives turns, broadcasts state, and survives reconnects.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates/destroys rooms, lists the joinable ones
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomStatus`]: lifecycle state machine
//! - [`RoomSettings`] / [`RoomConfig`]: per-room shape and shared policy

mod config;
mod error;
mod manager;
mod room;

pub use config::{
    MAX_BOARD_SIZE, MIN_BOARD_SIZE, RoomConfig, RoomSettings, TimeoutPolicy, VotePolicy,
};
pub use error::RoomError;
pub use manager::RoomManager;
pub use palisade_protocol::RoomStatus;
pub use room::{Entered, RoomHandle, RoomInfo};
