//! Value types shared by the board and the turn state machine.
//!
//! Everything here is plain data: coordinates, motions, wall directions and
//! the in-game player record. They derive serde so the protocol layer can
//! put them on the wire without wrapper types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EngineError;

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// A player's display symbol, e.g. `"甲"` or `"X"`.
///
/// Symbols are unique within one game, so inside the engine a symbol *is*
/// the player's identity. Serialized as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    /// Returns the symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A board coordinate. `row` grows downwards, `col` grows to the right.
///
/// On the wire a cell is a two-element array `[row, col]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Applies a motion, returning `None` if the result would be negative.
    pub fn offset(self, motion: Motion) -> Option<Cell> {
        let row = self.row.checked_add_signed(motion.d_row)?;
        let col = self.col.checked_add_signed(motion.d_col)?;
        Some(Cell { row, col })
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl From<Cell> for (usize, usize) {
    fn from(cell: Cell) -> Self {
        (cell.row, cell.col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// A relative move `[d_row, d_col]` submitted by a player.
///
/// Any pair of integers deserializes; whether the move is legal is decided
/// by [`Board::apply_action`](crate::Board::apply_action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(isize, isize)", into = "(isize, isize)")]
pub struct Motion {
    pub d_row: isize,
    pub d_col: isize,
}

impl Motion {
    pub const STAY: Motion = Motion { d_row: 0, d_col: 0 };

    pub const fn new(d_row: isize, d_col: isize) -> Self {
        Self { d_row, d_col }
    }
}

impl From<(isize, isize)> for Motion {
    fn from((d_row, d_col): (isize, isize)) -> Self {
        Self { d_row, d_col }
    }
}

impl From<Motion> for (isize, isize) {
    fn from(m: Motion) -> Self {
        (m.d_row, m.d_col)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of the destination cell a wall is planted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "u")]
    Up,
    #[serde(alias = "d")]
    Down,
    #[serde(alias = "l")]
    Left,
    #[serde(alias = "r")]
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    /// Accepts the full names and the one-letter forms `u`/`d`/`l`/`r`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" | "u" => Ok(Self::Up),
            "down" | "d" => Ok(Self::Down),
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            _ => Err(EngineError::InvalidMotion),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Whether a player still takes turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Active,
    Eliminated,
}

/// An in-game actor. Knows nothing about connections or identities.
///
/// Equality and hashing only look at the symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub symbol: Symbol,
    pub position: Cell,
    pub status: PlayerStatus,
}

impl Player {
    pub fn new(symbol: impl Into<Symbol>, position: Cell) -> Self {
        Self {
            symbol: symbol.into(),
            position,
            status: PlayerStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Player {}

impl Hash for Player {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}
