//! The turn state machine.
//!
//! A [`Game`] is driven from the outside: the caller repeatedly invokes
//! [`Game::resume`], feeding a [`TurnInput`] only when the last event was a
//! prompt, and reacts to the single [`GameEvent`] each call yields.
//!
//! ```text
//!  Init ──► AwaitingAction ──Act ok──► Resolving ──► CheckingEliminations
//!                ▲   │ ▲                                   │        │
//!                │   │ └─ bad move (same player, message)  │        │
//!                │   └─── Pass / Resign                    │        │
//!                └────────── next active player ◄──────────┘        │
//!                                                  ≤ 1 active ──► Terminal
//! ```

use std::collections::VecDeque;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::{Board, Cell, Direction, EngineError, Motion, Player, PlayerStatus, Symbol};

/// Fewest players a game can start with.
pub const MIN_PLAYERS: usize = 2;

/// Most players a game can seat (one per corner).
pub const MAX_PLAYERS: usize = 4;

// ---------------------------------------------------------------------------
// Inputs and events
// ---------------------------------------------------------------------------

/// What the current player decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// Move by `motion`, then wall side `wall` of the destination.
    Act { motion: Motion, wall: Direction },
    /// Give up this turn without touching the board.
    Pass,
    /// Leave the game; the player is eliminated where they stand.
    Resign,
}

/// One step of progress reported by [`Game::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The walls or positions changed; read them from [`Game::board`].
    UpdateMap,
    /// `player` must act. `message` explains why a previous attempt was
    /// rejected and is empty otherwise.
    AwaitingAction { player: Symbol, message: String },
    /// A move went through.
    ActionApplied {
        player: Symbol,
        from: Cell,
        to: Cell,
        wall: Direction,
    },
    /// `player` is out, scoring the size of the region they occupy.
    Eliminated { player: Symbol, score: usize },
    /// The game is over.
    Terminal(GameResult),
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// One line of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub symbol: Symbol,
    pub score: usize,
}

/// Final ranking: every player with the size of the region they occupy,
/// best first. Equal scores share a rank (`1, 1, 3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub standings: Vec<Standing>,
}

impl GameResult {
    fn from_board(board: &Board) -> Self {
        let mut scored: Vec<(Symbol, usize)> = board
            .players()
            .iter()
            .map(|p| (p.symbol.clone(), board.regions().size_at(p.position)))
            .collect();
        // Stable, so ties keep turn order.
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let mut standings: Vec<Standing> = Vec::with_capacity(scored.len());
        for (i, (symbol, score)) in scored.into_iter().enumerate() {
            let rank = match standings.last() {
                Some(prev) if prev.score == score => prev.rank,
                _ => i + 1,
            };
            standings.push(Standing { rank, symbol, score });
        }
        Self { standings }
    }

    /// Score of the given player, if they took part.
    pub fn score_of(&self, symbol: &Symbol) -> Option<usize> {
        self.standings
            .iter()
            .find(|s| &s.symbol == symbol)
            .map(|s| s.score)
    }

    /// The sole leader, or `None` when the top score is shared.
    pub fn winner(&self) -> Option<&Symbol> {
        match self.standings.as_slice() {
            [first, second, ..] if first.score == second.score => None,
            [first, ..] => Some(&first.symbol),
            [] => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// Where the game currently stands. Player references are turn-order
/// indices into [`Board::players`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Init,
    AwaitingAction { current: usize, last_error: String },
    Resolving { current: usize },
    CheckingEliminations {
        current: usize,
        pending: VecDeque<usize>,
    },
    Terminal,
}

impl TurnState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "initialising",
            Self::AwaitingAction { .. } => "awaiting an action",
            Self::Resolving { .. } => "resolving a move",
            Self::CheckingEliminations { .. } => "checking eliminations",
            Self::Terminal => "finished",
        }
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A board plus the state machine that walks it through a game.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    /// Turn order and starting cells, kept for [`reset`](Self::reset).
    initial: Vec<Player>,
    state: TurnState,
    active: usize,
}

impl Game {
    /// Starts a game on a `size × size` board with the given players.
    ///
    /// # Errors
    /// [`EngineError::InvalidBoard`] if the player count is outside
    /// [`MIN_PLAYERS`]`..=`[`MAX_PLAYERS`] or the board rejects the layout.
    pub fn new(size: usize, players: Vec<Player>) -> Result<Self, EngineError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players.len()) {
            return Err(EngineError::InvalidBoard(format!(
                "a game needs {MIN_PLAYERS} to {MAX_PLAYERS} players, got {}",
                players.len()
            )));
        }
        let board = Board::new(size, players.clone())?;
        let active = players.len();
        Ok(Self {
            board,
            initial: players,
            state: TurnState::Init,
            active,
        })
    }

    /// Starts a game with one player per symbol, placed on the corners in
    /// the order top-left, bottom-right, top-right, bottom-left.
    pub fn with_symbols<I, S>(size: usize, symbols: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let far = size.saturating_sub(1);
        let corners = [
            Cell::new(0, 0),
            Cell::new(far, far),
            Cell::new(0, far),
            Cell::new(far, 0),
        ];
        let symbols: Vec<Symbol> = symbols.into_iter().map(Into::into).collect();
        if symbols.len() > corners.len() {
            return Err(EngineError::InvalidBoard(format!(
                "at most {MAX_PLAYERS} players fit on the corners"
            )));
        }
        let players = symbols
            .into_iter()
            .zip(corners)
            .map(|(symbol, cell)| Player::new(symbol, cell))
            .collect();
        Self::new(size, players)
    }

    /// Puts every player back on their starting cell, clears all walls and
    /// returns to [`TurnState::Init`].
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.board = Board::new(self.board.size(), self.initial.clone())?;
        self.active = self.initial.len();
        self.state = TurnState::Init;
        Ok(())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Number of players still taking turns.
    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn is_over(&self) -> bool {
        self.state == TurnState::Terminal
    }

    /// The player whose action is awaited, if any.
    pub fn current(&self) -> Option<&Player> {
        match &self.state {
            TurnState::AwaitingAction { current, .. } => self.board.players().get(*current),
            _ => None,
        }
    }

    /// The ranking as it would stand if the game ended now.
    pub fn standings(&self) -> GameResult {
        GameResult::from_board(&self.board)
    }

    /// Advances the game by one event.
    ///
    /// `input` must be `Some` exactly when the state is
    /// [`TurnState::AwaitingAction`] and the prompt has already been
    /// emitted; every other state takes `None`. Passing `None` while
    /// awaiting an action re-emits the prompt.
    ///
    /// # Errors
    /// - [`EngineError::GameOver`] after the terminal event
    /// - [`EngineError::UnexpectedInput`] for an input the state does not take
    ///
    /// Rejected moves are not errors: they come back as another
    /// [`GameEvent::AwaitingAction`] carrying the reason.
    pub fn resume(&mut self, input: Option<TurnInput>) -> Result<GameEvent, EngineError> {
        let state = mem::replace(&mut self.state, TurnState::Terminal);
        let (next, result) = self.transition(state, input);
        self.state = next;
        result
    }

    fn transition(
        &mut self,
        state: TurnState,
        input: Option<TurnInput>,
    ) -> (TurnState, Result<GameEvent, EngineError>) {
        match (state, input) {
            (TurnState::Init, None) => {
                self.board.recompute_regions();
                let next = match self.next_active_from(0) {
                    Some(first) => TurnState::AwaitingAction {
                        current: first,
                        last_error: String::new(),
                    },
                    None => TurnState::Terminal,
                };
                (next, Ok(GameEvent::UpdateMap))
            }

            (TurnState::AwaitingAction { current, last_error }, None) => {
                let event = self.prompt(current, last_error.clone());
                (TurnState::AwaitingAction { current, last_error }, event)
            }

            (TurnState::AwaitingAction { current, last_error }, Some(TurnInput::Act { motion, wall })) => {
                let from = match self.board.player(current) {
                    Ok(p) => p.position,
                    Err(e) => return (TurnState::AwaitingAction { current, last_error }, Err(e)),
                };
                match self.board.apply_action(current, motion, wall) {
                    Ok(to) => {
                        let player = self.symbol(current);
                        (
                            TurnState::Resolving { current },
                            Ok(GameEvent::ActionApplied { player, from, to, wall }),
                        )
                    }
                    Err(e) if e.is_recoverable() => {
                        let message = e.to_string();
                        let event = self.prompt(current, message.clone());
                        (
                            TurnState::AwaitingAction {
                                current,
                                last_error: message,
                            },
                            event,
                        )
                    }
                    Err(e) => (TurnState::AwaitingAction { current, last_error }, Err(e)),
                }
            }

            (TurnState::AwaitingAction { current, .. }, Some(TurnInput::Pass)) => {
                self.advance(current)
            }

            (TurnState::AwaitingAction { current, .. }, Some(TurnInput::Resign)) => {
                let event = self.eliminate(current);
                let pending = self.board.isolated_players().into();
                (TurnState::CheckingEliminations { current, pending }, event)
            }

            (TurnState::Resolving { current }, None) => {
                self.board.recompute_regions();
                let pending = self.board.isolated_players().into();
                (
                    TurnState::CheckingEliminations { current, pending },
                    Ok(GameEvent::UpdateMap),
                )
            }

            (TurnState::CheckingEliminations { current, mut pending }, None) => {
                while let Some(index) = pending.pop_front() {
                    if self.board.players()[index].is_active() {
                        let event = self.eliminate(index);
                        return (TurnState::CheckingEliminations { current, pending }, event);
                    }
                }
                if self.active <= 1 {
                    let result = GameResult::from_board(&self.board);
                    (TurnState::Terminal, Ok(GameEvent::Terminal(result)))
                } else {
                    self.advance(current)
                }
            }

            (TurnState::Terminal, _) => (TurnState::Terminal, Err(EngineError::GameOver)),

            (state, _) => {
                let name = state.name();
                (state, Err(EngineError::UnexpectedInput(name)))
            }
        }
    }

    /// Moves the turn to the next active player after `current` and
    /// emits their prompt.
    fn advance(&self, current: usize) -> (TurnState, Result<GameEvent, EngineError>) {
        match self.next_active_from(current + 1) {
            Some(next) => {
                let event = self.prompt(next, String::new());
                (
                    TurnState::AwaitingAction {
                        current: next,
                        last_error: String::new(),
                    },
                    event,
                )
            }
            None => (
                TurnState::Terminal,
                Ok(GameEvent::Terminal(GameResult::from_board(&self.board))),
            ),
        }
    }

    /// First active player at or after `start`, wrapping around.
    fn next_active_from(&self, start: usize) -> Option<usize> {
        let players = self.board.players();
        let n = players.len();
        (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&i| players[i].is_active())
    }

    fn eliminate(&mut self, index: usize) -> Result<GameEvent, EngineError> {
        let score = self.board.score_of(index)?;
        self.board.set_status(index, PlayerStatus::Eliminated);
        self.active = self.active.saturating_sub(1);
        Ok(GameEvent::Eliminated {
            player: self.symbol(index),
            score,
        })
    }

    fn prompt(&self, index: usize, message: String) -> Result<GameEvent, EngineError> {
        Ok(GameEvent::AwaitingAction {
            player: self.board.player(index)?.symbol.clone(),
            message,
        })
    }

    fn symbol(&self, index: usize) -> Symbol {
        self.board.players()[index].symbol.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn act(d_row: isize, d_col: isize, wall: Direction) -> Option<TurnInput> {
        Some(TurnInput::Act {
            motion: Motion::new(d_row, d_col),
            wall,
        })
    }

    fn prompt_for(symbol: &str) -> GameEvent {
        GameEvent::AwaitingAction {
            player: Symbol::from(symbol),
            message: String::new(),
        }
    }

    /// A 2-player game that has emitted its first map and prompt.
    fn started(size: usize) -> Game {
        let mut game = Game::with_symbols(size, ["A", "B"]).unwrap();
        assert_eq!(game.resume(None).unwrap(), GameEvent::UpdateMap);
        assert_eq!(game.resume(None).unwrap(), prompt_for("A"));
        game
    }

    /// Plays one accepted move and the map update that follows it.
    fn play(game: &mut Game, input: Option<TurnInput>) {
        assert!(matches!(
            game.resume(input).unwrap(),
            GameEvent::ActionApplied { .. }
        ));
        assert_eq!(game.resume(None).unwrap(), GameEvent::UpdateMap);
    }

    /// Drains the game until the next prompt or the end, collecting events.
    fn drain(game: &mut Game) -> Vec<GameEvent> {
        let mut events = Vec::new();
        loop {
            let event = game.resume(None).unwrap();
            let stop = matches!(
                event,
                GameEvent::AwaitingAction { .. } | GameEvent::Terminal(_)
            );
            events.push(event);
            if stop {
                return events;
            }
        }
    }

    // =====================================================================
    // construction
    // =====================================================================

    #[test]
    fn test_with_symbols_places_players_on_corners() {
        let game = Game::with_symbols(5, ["A", "B", "C", "D"]).unwrap();
        let cells: Vec<Cell> = game.board().players().iter().map(|p| p.position).collect();
        assert_eq!(
            cells,
            vec![
                Cell::new(0, 0),
                Cell::new(4, 4),
                Cell::new(0, 4),
                Cell::new(4, 0)
            ]
        );
    }

    #[test]
    fn test_new_player_count_out_of_range_rejected() {
        assert!(Game::with_symbols(5, ["A"]).is_err());
        assert!(Game::with_symbols(5, ["A", "B", "C", "D", "E"]).is_err());
    }

    // =====================================================================
    // resume() basics
    // =====================================================================

    #[test]
    fn test_resume_init_emits_map_then_prompt_for_first_player() {
        let game = started(5);
        assert_eq!(game.current().unwrap().symbol, Symbol::from("A"));
    }

    #[test]
    fn test_resume_awaiting_without_input_reemits_prompt() {
        let mut game = started(5);
        assert_eq!(game.resume(None).unwrap(), prompt_for("A"));
        assert_eq!(game.resume(None).unwrap(), prompt_for("A"));
    }

    #[test]
    fn test_resume_input_in_init_is_unexpected() {
        let mut game = Game::with_symbols(4, ["A", "B"]).unwrap();
        let err = game.resume(Some(TurnInput::Pass)).unwrap_err();
        assert!(matches!(err, EngineError::UnexpectedInput(_)));
        assert_eq!(game.state(), &TurnState::Init);
    }

    #[test]
    fn test_resume_bad_motion_reprompts_same_player_with_message() {
        let mut game = started(6);
        let event = game.resume(act(3, 3, Direction::Up)).unwrap();
        match event {
            GameEvent::AwaitingAction { player, message } => {
                assert_eq!(player, Symbol::from("A"));
                assert_eq!(message, "invalid motion");
            }
            other => panic!("expected a re-prompt, got {other:?}"),
        }
        assert_eq!(game.board().players()[0].position, Cell::new(0, 0));
        // Plain resume keeps the message.
        assert!(matches!(
            game.resume(None).unwrap(),
            GameEvent::AwaitingAction { message, .. } if message == "invalid motion"
        ));
    }

    #[test]
    fn test_resume_wall_on_border_reprompts_with_wall_message() {
        let mut game = started(4);
        let event = game.resume(act(0, 0, Direction::Up)).unwrap();
        assert_eq!(
            event,
            GameEvent::AwaitingAction {
                player: Symbol::from("A"),
                message: "there is already a wall".into(),
            }
        );
    }

    #[test]
    fn test_resume_move_then_next_player_prompted() {
        let mut game = started(6);
        assert_eq!(
            game.resume(act(1, 1, Direction::Down)).unwrap(),
            GameEvent::ActionApplied {
                player: Symbol::from("A"),
                from: Cell::new(0, 0),
                to: Cell::new(1, 1),
                wall: Direction::Down,
            }
        );
        assert_eq!(drain(&mut game), vec![GameEvent::UpdateMap, prompt_for("B")]);
    }

    #[test]
    fn test_resume_pass_advances_without_board_change() {
        let mut game = started(4);
        let walls_before = game.board().wall_above().to_vec();
        assert_eq!(game.resume(Some(TurnInput::Pass)).unwrap(), prompt_for("B"));
        assert_eq!(game.board().wall_above(), walls_before.as_slice());
        assert_eq!(game.resume(Some(TurnInput::Pass)).unwrap(), prompt_for("A"));
    }

    #[test]
    fn test_resume_after_terminal_is_game_over() {
        let mut game = started(4);
        game.resume(Some(TurnInput::Resign)).unwrap();
        let events = drain(&mut game);
        assert!(matches!(events.last(), Some(GameEvent::Terminal(_))));
        assert!(game.is_over());
        assert_eq!(game.resume(None), Err(EngineError::GameOver));
    }

    // =====================================================================
    // elimination
    // =====================================================================

    /// 3×3, A at (0,0), B at (2,2). A builds a wall down column 0's right
    /// side over three turns; B just passes.
    fn split_column_zero() -> (Game, Vec<GameEvent>) {
        let mut game = started(3);
        play(&mut game, act(0, 0, Direction::Right));
        assert_eq!(drain(&mut game), vec![prompt_for("B")]);
        game.resume(Some(TurnInput::Pass)).unwrap();
        play(&mut game, act(1, 0, Direction::Right));
        assert_eq!(drain(&mut game), vec![prompt_for("B")]);
        game.resume(Some(TurnInput::Pass)).unwrap();
        play(&mut game, act(1, 0, Direction::Right));
        let events = drain(&mut game);
        (game, events)
    }

    #[test]
    fn test_isolated_player_eliminated_with_region_size() {
        let (game, events) = split_column_zero();
        assert_eq!(
            events[0],
            GameEvent::Eliminated {
                player: Symbol::from("A"),
                score: 3
            }
        );
        assert_eq!(
            events[1],
            GameEvent::Eliminated {
                player: Symbol::from("B"),
                score: 6
            }
        );
        match &events[2] {
            GameEvent::Terminal(result) => {
                assert_eq!(result.standings[0].symbol, Symbol::from("B"));
                assert_eq!(result.standings[0].rank, 1);
                assert_eq!(result.standings[1].rank, 2);
                assert_eq!(result.winner(), Some(&Symbol::from("B")));
            }
            other => panic!("expected terminal, got {other:?}"),
        }
        assert!(game.board().players().iter().all(|p| !p.is_active()));
        assert_eq!(game.active_count(), 0);
    }

    #[test]
    fn test_eliminated_player_skipped_and_reported_once() {
        // 4 players on 4×4. A seals itself into (0,0) with two walls.
        let mut game = Game::with_symbols(4, ["A", "B", "C", "D"]).unwrap();
        game.resume(None).unwrap();
        assert_eq!(game.resume(None).unwrap(), prompt_for("A"));
        // A walls its right side without moving.
        play(&mut game, act(0, 0, Direction::Right));
        assert_eq!(drain(&mut game), vec![prompt_for("B")]);
        game.resume(Some(TurnInput::Pass)).unwrap();
        game.resume(Some(TurnInput::Pass)).unwrap();
        game.resume(Some(TurnInput::Pass)).unwrap();
        // A walls below itself and is now alone in a 1-cell region.
        play(&mut game, act(0, 0, Direction::Down));
        let events = drain(&mut game);
        assert_eq!(
            events,
            vec![
                GameEvent::Eliminated {
                    player: Symbol::from("A"),
                    score: 1
                },
                prompt_for("B"),
            ]
        );
        assert_eq!(game.board().players()[0].status, PlayerStatus::Eliminated);
        assert_eq!(game.active_count(), 3);

        // A full round: A's slot is skipped and A is never reported again.
        let mut seen = Vec::new();
        for _ in 0..3 {
            let event = game.resume(Some(TurnInput::Pass)).unwrap();
            seen.push(event);
        }
        assert_eq!(seen, vec![prompt_for("C"), prompt_for("D"), prompt_for("B")]);

        play(&mut game, act(0, -1, Direction::Up));
        let events = drain(&mut game);
        assert!(events
            .iter()
            .all(|e| !matches!(e, GameEvent::Eliminated { player, .. } if player.as_str() == "A")));
    }

    #[test]
    fn test_resign_eliminates_and_ends_two_player_game() {
        let mut game = started(4);
        let event = game.resume(Some(TurnInput::Resign)).unwrap();
        assert_eq!(
            event,
            GameEvent::Eliminated {
                player: Symbol::from("A"),
                score: 16
            }
        );
        let events = drain(&mut game);
        assert!(matches!(events.last(), Some(GameEvent::Terminal(_))));
    }

    #[test]
    fn test_resign_in_three_player_game_continues_with_next() {
        let mut game = Game::with_symbols(4, ["A", "B", "C"]).unwrap();
        game.resume(None).unwrap();
        game.resume(None).unwrap();
        game.resume(Some(TurnInput::Resign)).unwrap();
        assert_eq!(drain(&mut game), vec![prompt_for("B")]);
        assert_eq!(game.active_count(), 2);
    }

    // =====================================================================
    // result
    // =====================================================================

    #[test]
    fn test_game_result_ties_share_rank() {
        let mut game = Game::with_symbols(4, ["A", "B", "C"]).unwrap();
        game.resume(None).unwrap();
        let result = game.standings();
        let ranks: Vec<usize> = result.standings.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 1, 1]);
        assert_eq!(result.winner(), None);

        let board = Board::new(
            2,
            vec![
                Player::new("A", Cell::new(0, 0)),
                Player::new("B", Cell::new(0, 1)),
                Player::new("C", Cell::new(1, 1)),
            ],
        )
        .unwrap();
        let mut board = board;
        board.place_wall(Cell::new(0, 0), Direction::Down).unwrap();
        board.place_wall(Cell::new(0, 0), Direction::Right).unwrap();
        board.recompute_regions();
        let result = GameResult::from_board(&board);
        let ranks: Vec<(String, usize, usize)> = result
            .standings
            .iter()
            .map(|s| (s.symbol.to_string(), s.score, s.rank))
            .collect();
        assert_eq!(
            ranks,
            vec![
                ("B".to_string(), 3, 1),
                ("C".to_string(), 3, 1),
                ("A".to_string(), 1, 3)
            ]
        );
    }

    #[test]
    fn test_reset_restores_initial_layout() {
        let (mut game, _) = split_column_zero();
        assert!(game.is_over());
        game.reset().unwrap();
        assert_eq!(game.state(), &TurnState::Init);
        assert_eq!(game.active_count(), 2);
        assert!(game.board().players().iter().all(Player::is_active));
        assert_eq!(game.board().players()[0].position, Cell::new(0, 0));
        assert!(!game.board().wall_left()[0][1]);
        assert_eq!(game.resume(None).unwrap(), GameEvent::UpdateMap);
    }
}
