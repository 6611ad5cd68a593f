//! Board engine for Palisade.
//!
//! Pure game logic: no I/O, no async. A [`Game`] owns a [`Board`] and walks
//! it through a turn state machine; the caller drives it with
//! [`Game::resume`] and reacts to the [`GameEvent`] each call yields.
//!
//! # Key types
//!
//! - [`Board`]: wall grids, player positions, movement and wall rules
//! - [`RegionMap`]: connected regions, rebuilt after every wall
//! - [`Game`] / [`TurnState`]: the turn state machine
//! - [`GameResult`]: tie-aware final ranking

mod board;
mod error;
mod game;
mod region;
mod types;

pub use board::{Board, MAX_STEPS, MIN_SIZE};
pub use error::EngineError;
pub use game::{
    Game, GameEvent, GameResult, MAX_PLAYERS, MIN_PLAYERS, Standing, TurnInput, TurnState,
};
pub use region::{RegionId, RegionMap};
pub use types::{Cell, Direction, Motion, Player, PlayerStatus, Symbol};
