//! Error types for the engine.

/// Errors produced by board operations and the turn state machine.
///
/// The first three variants are part of normal play: the player picked a
/// bad move and gets asked again. Everything else is a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The edge already carries a wall (this includes the outer border).
    #[error("there is already a wall")]
    AlreadyWalled,

    /// The wall (or the cell it is anchored to) lies outside the board.
    #[error("the wall would fall outside the board")]
    OutOfBounds,

    /// The destination is not among the player's reachable points.
    #[error("invalid motion")]
    InvalidMotion,

    /// No player with this turn-order index exists.
    #[error("unknown player #{0}")]
    UnknownPlayer(usize),

    /// The board could not be built from the given size and players.
    #[error("invalid board: {0}")]
    InvalidBoard(String),

    /// The game already reached its terminal state.
    #[error("the game is over")]
    GameOver,

    /// `resume` was called with an input the current state does not take.
    #[error("unexpected input while {0}")]
    UnexpectedInput(&'static str),
}

impl EngineError {
    /// Returns `true` for errors that only mean "ask the same player again".
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AlreadyWalled | Self::OutOfBounds | Self::InvalidMotion
        )
    }
}
