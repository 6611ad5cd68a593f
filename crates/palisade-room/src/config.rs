//! Room settings and runtime policy.

use std::collections::HashSet;
use std::time::Duration;

use palisade_engine::{MAX_PLAYERS, MIN_PLAYERS, Symbol};
use serde::{Deserialize, Serialize};

/// Smallest board a room may be created with.
pub const MIN_BOARD_SIZE: usize = 2;

/// Largest board a room may be created with.
pub const MAX_BOARD_SIZE: usize = 20;

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// What a `createRoom` request asks for: one game's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Display name shown in room listings.
    pub name: String,

    /// Board side length.
    pub size: usize,

    /// One symbol per seat, in turn order.
    pub symbols: Vec<Symbol>,
}

impl RoomSettings {
    /// Two seats (`甲`, `乙`) on a board of the given size.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            ..Self::default()
        }
    }

    /// Checks the settings before a room is spawned.
    ///
    /// Returns a player-facing reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("the room name must not be blank".into());
        }
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&self.size) {
            return Err(format!(
                "the board size must be between {MIN_BOARD_SIZE} and {MAX_BOARD_SIZE}"
            ));
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.symbols.len()) {
            return Err(format!(
                "a room seats {MIN_PLAYERS} to {MAX_PLAYERS} players"
            ));
        }
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if symbol.as_str().trim().is_empty() {
                return Err("player symbols must not be blank".into());
            }
            if !seen.insert(symbol) {
                return Err(format!("duplicate player symbol {symbol}"));
            }
        }
        Ok(())
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            size: 7,
            symbols: vec![Symbol::from("甲"), Symbol::from("乙")],
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// What happens to a player who lets a turn prompt time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeoutPolicy {
    /// The turn passes to the next player; nothing else changes.
    #[default]
    SkipTurn,
    /// The player is eliminated where they stand.
    Eliminate,
}

/// How restart ballots are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VotePolicy {
    /// Every seated player must vote yes. Any decline, timeout, or
    /// malformed reply aborts the restart.
    #[default]
    Unanimous,
    /// More than half of the seated players must vote yes.
    Majority,
}

impl VotePolicy {
    /// Whether `yes` out of `total` ballots carries the vote.
    pub fn passes(self, yes: usize, total: usize) -> bool {
        match self {
            Self::Unanimous => total > 0 && yes == total,
            Self::Majority => yes * 2 > total,
        }
    }
}

/// Runtime policy shared by every room a manager spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a player may sit on a turn prompt. `None` waits forever.
    pub turn_timeout: Option<Duration>,

    /// Applied when `turn_timeout` fires.
    pub timeout_policy: TimeoutPolicy,

    /// Whether to ask players for a rematch after a game ends. When
    /// `false` the room closes as soon as the results are out.
    pub restart_vote: bool,

    /// How ballots are counted.
    pub vote_policy: VotePolicy,

    /// How long to wait for ballots. `None` waits forever.
    pub vote_timeout: Option<Duration>,

    /// Capacity of each room's command channel.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            turn_timeout: None,
            timeout_policy: TimeoutPolicy::SkipTurn,
            restart_vote: false,
            vote_policy: VotePolicy::Unanimous,
            vote_timeout: Some(Duration::from_secs(60)),
            command_buffer: 64,
        }
    }
}
