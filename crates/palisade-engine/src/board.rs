//! The board: wall grids, player positions and movement rules.
//!
//! # Wall model
//!
//! Walls live on the edges between cells and are stored in two grids of
//! `size × size` booleans:
//!
//! ```text
//!            col c
//!          ┌───────┐  ← wall_above[r][c]   (edge between row r-1 and r)
//!  wall_left[r][c] → │ (r,c) │
//!          └───────┘
//! ```
//!
//! Row 0 of `wall_above` and column 0 of `wall_left` are the top and left
//! border and start out walled. The bottom and right borders have no slot
//! in either grid; asking for a wall there yields
//! [`EngineError::OutOfBounds`].
//!
//! Walls are monotone: nothing in this module ever clears one.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt::Write as _;

use crate::{Cell, Direction, EngineError, Motion, Player, PlayerStatus, RegionMap};

/// How many steps a player may walk in one turn.
pub const MAX_STEPS: usize = 3;

/// Smallest board the engine accepts.
pub const MIN_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WallGrid {
    Above,
    Left,
}

/// The full board state for one game.
#[derive(Debug, Clone)]
pub struct Board {
    size: usize,
    wall_above: Vec<Vec<bool>>,
    wall_left: Vec<Vec<bool>>,
    /// Players in turn order.
    players: Vec<Player>,
    regions: RegionMap,
}

impl Board {
    /// Builds an empty board (only the border walled) with the given players.
    ///
    /// # Errors
    /// [`EngineError::InvalidBoard`] if the size is below [`MIN_SIZE`], a
    /// player stands off the board, two players share a cell, or two
    /// players share a symbol.
    pub fn new(size: usize, players: Vec<Player>) -> Result<Self, EngineError> {
        if size < MIN_SIZE {
            return Err(EngineError::InvalidBoard(format!(
                "size must be at least {MIN_SIZE}, got {size}"
            )));
        }

        let mut symbols = HashSet::new();
        let mut cells = HashSet::new();
        for p in &players {
            if p.position.row >= size || p.position.col >= size {
                return Err(EngineError::InvalidBoard(format!(
                    "player {} at {} is off the board",
                    p.symbol, p.position
                )));
            }
            if !symbols.insert(p.symbol.clone()) {
                return Err(EngineError::InvalidBoard(format!(
                    "duplicate symbol {}",
                    p.symbol
                )));
            }
            if !cells.insert(p.position) {
                return Err(EngineError::InvalidBoard(format!(
                    "two players start on {}",
                    p.position
                )));
            }
        }

        let mut wall_above = vec![vec![false; size]; size];
        let mut wall_left = vec![vec![false; size]; size];
        for i in 0..size {
            wall_above[0][i] = true;
            wall_left[i][0] = true;
        }

        Ok(Self {
            size,
            wall_above,
            wall_left,
            players,
            regions: RegionMap::whole(size),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Players in turn order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, index: usize) -> Result<&Player, EngineError> {
        self.players
            .get(index)
            .ok_or(EngineError::UnknownPlayer(index))
    }

    /// Turn-order index of the player with this symbol.
    pub fn index_of(&self, symbol: &crate::Symbol) -> Option<usize> {
        self.players.iter().position(|p| &p.symbol == symbol)
    }

    pub fn wall_above(&self) -> &[Vec<bool>] {
        &self.wall_above
    }

    pub fn wall_left(&self) -> &[Vec<bool>] {
        &self.wall_left
    }

    /// The current region labelling (as of the last recompute).
    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    /// Size of the region the given player stands in.
    pub fn score_of(&self, index: usize) -> Result<usize, EngineError> {
        Ok(self.regions.size_at(self.player(index)?.position))
    }

    /// Returns `true` if the edge on side `dir` of `cell` blocks movement.
    /// Edges on the outer border always block.
    pub fn is_walled(&self, cell: Cell, dir: Direction) -> bool {
        match self.wall_slot(cell, dir) {
            Some((WallGrid::Above, r, c)) => self.wall_above[r][c],
            Some((WallGrid::Left, r, c)) => self.wall_left[r][c],
            None => true,
        }
    }

    /// Cells one step away from `cell` across an open edge.
    pub fn open_neighbours(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        Direction::ALL.into_iter().filter_map(move |dir| {
            if self.is_walled(cell, dir) {
                return None;
            }
            let next = match dir {
                Direction::Up => Cell::new(cell.row.checked_sub(1)?, cell.col),
                Direction::Down => Cell::new(cell.row + 1, cell.col),
                Direction::Left => Cell::new(cell.row, cell.col.checked_sub(1)?),
                Direction::Right => Cell::new(cell.row, cell.col + 1),
            };
            (next.row < self.size && next.col < self.size).then_some(next)
        })
    }

    /// Cells the player may end the turn on: a breadth-first walk of at most
    /// [`MAX_STEPS`] steps across open edges. Cells held by another active
    /// player are neither destinations nor passable. The starting cell is
    /// always included.
    pub fn reachable_points(&self, index: usize) -> Result<BTreeSet<Cell>, EngineError> {
        let start = self.player(index)?.position;
        let blocked: HashSet<Cell> = self
            .players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != index && p.is_active())
            .map(|(_, p)| p.position)
            .collect();

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([(start, 0)]);
        while let Some((cell, steps)) = queue.pop_front() {
            if steps == MAX_STEPS {
                continue;
            }
            for next in self.open_neighbours(cell) {
                if !blocked.contains(&next) && seen.insert(next) {
                    queue.push_back((next, steps + 1));
                }
            }
        }
        Ok(seen)
    }

    /// Plants a wall on side `dir` of `cell`.
    ///
    /// # Errors
    /// - [`EngineError::OutOfBounds`]: the slot is outside the grids
    ///   (bottom/right border, or a cell off the board)
    /// - [`EngineError::AlreadyWalled`]: the edge is already walled
    pub fn place_wall(&mut self, cell: Cell, dir: Direction) -> Result<(), EngineError> {
        let (grid, r, c) = self
            .wall_slot(cell, dir)
            .ok_or(EngineError::OutOfBounds)?;
        let slot = match grid {
            WallGrid::Above => &mut self.wall_above[r][c],
            WallGrid::Left => &mut self.wall_left[r][c],
        };
        if *slot {
            return Err(EngineError::AlreadyWalled);
        }
        *slot = true;
        Ok(())
    }

    /// Moves the player by `motion` and plants a wall on side `dir` of the
    /// destination. Returns the destination.
    ///
    /// Nothing changes if any check fails: the wall is validated before the
    /// player moves.
    ///
    /// # Errors
    /// [`EngineError::InvalidMotion`] if the destination is not reachable,
    /// otherwise the errors of [`place_wall`](Self::place_wall).
    pub fn apply_action(
        &mut self,
        index: usize,
        motion: Motion,
        dir: Direction,
    ) -> Result<Cell, EngineError> {
        let reachable = self.reachable_points(index)?;
        let destination = self.players[index]
            .position
            .offset(motion)
            .filter(|cell| reachable.contains(cell))
            .ok_or(EngineError::InvalidMotion)?;

        self.place_wall(destination, dir)?;
        self.players[index].position = destination;
        Ok(destination)
    }

    /// Rebuilds the region map from the current walls.
    pub fn recompute_regions(&mut self) {
        let regions = RegionMap::flood(self.size, |cell| {
            self.open_neighbours(cell).collect::<Vec<_>>()
        });
        self.regions = regions;
    }

    /// Active players whose region holds no other active player.
    /// Returned in turn order.
    pub fn isolated_players(&self) -> Vec<usize> {
        let active: Vec<(usize, usize)> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active())
            .map(|(i, p)| (i, self.regions.region_of(p.position)))
            .collect();

        active
            .iter()
            .filter(|(i, region)| {
                !active.iter().any(|(j, other)| j != i && other == region)
            })
            .map(|(i, _)| *i)
            .collect()
    }

    /// Rows of a wall grid as `'0'`/`'1'` strings, the wire format for maps.
    pub fn wall_rows(grid: &[Vec<bool>]) -> Vec<String> {
        grid.iter()
            .map(|row| row.iter().map(|&w| if w { '1' } else { '0' }).collect())
            .collect()
    }

    /// ASCII rendering, one text row per wall row and one per cell row.
    ///
    /// ```text
    /// +--+--+
    /// |A    |
    /// +  +--+
    /// |    B|
    /// +--+--+
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        for r in 0..self.size {
            out.push('+');
            for c in 0..self.size {
                out.push_str(if self.wall_above[r][c] { "--" } else { "  " });
                out.push('+');
            }
            out.push('\n');
            for c in 0..self.size {
                out.push(if self.wall_left[r][c] { '|' } else { ' ' });
                match self.players.iter().find(|p| p.position == Cell::new(r, c)) {
                    Some(p) => {
                        let _ = write!(out, "{:<2}", p.symbol.as_str());
                    }
                    None => out.push_str("  "),
                }
            }
            out.push_str("|\n");
        }
        out.push('+');
        out.push_str(&"--+".repeat(self.size));
        out.push('\n');
        out
    }

    pub(crate) fn set_status(&mut self, index: usize, status: PlayerStatus) {
        if let Some(p) = self.players.get_mut(index) {
            p.status = status;
        }
    }

    /// Maps a side of a cell to its slot in one of the two grids.
    fn wall_slot(&self, cell: Cell, dir: Direction) -> Option<(WallGrid, usize, usize)> {
        let (grid, r, c) = match dir {
            Direction::Up => (WallGrid::Above, cell.row, cell.col),
            Direction::Down => (WallGrid::Above, cell.row + 1, cell.col),
            Direction::Left => (WallGrid::Left, cell.row, cell.col),
            Direction::Right => (WallGrid::Left, cell.row, cell.col + 1),
        };
        (r < self.size && c < self.size).then_some((grid, r, c))
    }
}
