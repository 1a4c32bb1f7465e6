use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::puzzle::codec::{self, encode_board};
use crate::puzzle::{cell_of, position_of, Board, TileSet, CELL_COUNT};
use crate::solver::{Fingerprint, SolveOutcome, SolveReport, CHECKPOINT_INTERVAL};

/// One choice point on the search stack.
#[derive(Debug, Clone, Copy)]
pub(super) struct Frame {
    /// Row-major cell being filled.
    pub position: usize,
    /// Next choice to try, encoded as `tile_index * 4 + rotation`.
    pub cursor: usize,
    /// Tile index currently placed at `position`.
    pub placed: Option<usize>,
    /// Number of choices that placed legally so far.
    pub placements: u32,
}

impl Frame {
    fn new(position: usize) -> Self {
        Self {
            position,
            cursor: 0,
            placed: None,
            placements: 0,
        }
    }
}

enum Step {
    Descend(usize),
    Solved,
    Backtrack,
}

/// Depth-first search from one starting board.
///
/// The solver owns its board for its whole lifetime and is used for a single
/// attempt; after [`Solver::solve`] returns, the board state is unspecified.
pub struct Solver {
    pub(super) tiles: Arc<TileSet>,
    pub(super) board: Board,
    pub(super) used: Vec<bool>,
    pub(super) stack: Vec<Frame>,
    fingerprint: Fingerprint,
    best_depth: usize,
    best_board: Option<Vec<u8>>,
    checkpoint_interval: u64,
}

impl Solver {
    /// Build a solver from an encoded starting board.
    pub fn new(tiles: Arc<TileSet>, payload: &[u8]) -> Result<Self> {
        let placements = codec::decode(payload)?;
        let board = Board::from_placements(&tiles, &placements)?;
        Ok(Self::with_board(tiles, board))
    }

    pub fn with_board(tiles: Arc<TileSet>, board: Board) -> Self {
        let mut used = vec![false; tiles.len()];
        for p in board.placements() {
            if let Some(idx) = tiles.index_of(p.tile_id) {
                used[idx] = true;
            }
        }
        let best_depth = board.occupied_count();
        Self {
            tiles,
            board,
            used,
            stack: Vec::with_capacity(CELL_COUNT),
            fingerprint: Fingerprint::default(),
            best_depth,
            best_board: None,
            checkpoint_interval: CHECKPOINT_INTERVAL,
        }
    }

    /// Poll the cancellation token every `interval` nodes instead of the
    /// default.
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Run until solved, exhausted, or `cancel` is observed at a checkpoint.
    pub fn solve(&mut self, cancel: &CancellationToken) -> SolveReport {
        let start = match self.board.first_empty_cell() {
            Some((row, col)) => position_of(row, col),
            None => {
                tracing::debug!("Starting board already full");
                return self.solved_report();
            }
        };
        let starting_depth = self.board.occupied_count();
        tracing::debug!(start, starting_depth, "Starting search");

        if self.enter(start, cancel) {
            return self.split_report();
        }

        loop {
            if self.stack.is_empty() {
                tracing::debug!(
                    nodes = self.fingerprint.nodes_visited,
                    best_depth = self.best_depth,
                    "Search exhausted"
                );
                return self.report(SolveOutcome::Exhausted);
            }

            match self.advance() {
                Step::Descend(next) => {
                    if self.enter(next, cancel) {
                        return self.split_report();
                    }
                }
                Step::Solved => {
                    tracing::info!(nodes = self.fingerprint.nodes_visited, "Board solved");
                    return self.solved_report();
                }
                Step::Backtrack => {
                    if let Some(frame) = self.stack.pop() {
                        if frame.placements == 0 {
                            self.fingerprint
                                .fold_leaf(frame.position, self.board.occupied_count());
                        }
                    }
                }
            }
        }
    }

    /// Visit a node: count it, ratchet the best depth, push its frame.
    /// Returns true when the cancellation checkpoint fired.
    fn enter(&mut self, position: usize, cancel: &CancellationToken) -> bool {
        self.stack.push(Frame::new(position));
        self.fingerprint.nodes_visited += 1;

        let depth = self.board.occupied_count();
        if depth > self.best_depth {
            self.best_depth = depth;
            self.best_board = Some(encode_board(&self.board));
        }

        if self.fingerprint.nodes_visited % self.checkpoint_interval == 0 {
            tracing::debug!(
                nodes = self.fingerprint.nodes_visited,
                best_depth = self.best_depth,
                "Search checkpoint"
            );
            if cancel.is_cancelled() {
                return true;
            }
        }
        false
    }

    /// Undo the top frame's current choice and place its next legal one.
    fn advance(&mut self) -> Step {
        let total = self.tiles.len() * 4;
        let Some(frame) = self.stack.last_mut() else {
            return Step::Backtrack;
        };
        let (row, col) = cell_of(frame.position);

        if let Some(idx) = frame.placed.take() {
            self.board.remove(row, col);
            self.used[idx] = false;
        }

        while frame.cursor < total {
            let idx = frame.cursor / 4;
            let rotation = (frame.cursor % 4) as u8;
            if self.used[idx] {
                frame.cursor = (idx + 1) * 4;
                continue;
            }
            frame.cursor += 1;

            let tile = self.tiles.rotated(idx, rotation);
            if self.board.try_place(row, col, tile, rotation) {
                self.used[idx] = true;
                frame.placed = Some(idx);
                frame.placements += 1;
                return match self.board.next_empty_after(frame.position) {
                    Some(next) => Step::Descend(next),
                    None => Step::Solved,
                };
            }
        }
        Step::Backtrack
    }

    fn solved_report(&mut self) -> SolveReport {
        let position = self.stack.last().map(|f| f.position).unwrap_or(CELL_COUNT);
        self.fingerprint.fold_leaf(position, self.board.occupied_count());
        self.best_depth = CELL_COUNT;
        self.best_board = None;
        self.report(SolveOutcome::Solved {
            board: encode_board(&self.board),
        })
    }

    fn split_report(&mut self) -> SolveReport {
        tracing::debug!(
            nodes = self.fingerprint.nodes_visited,
            depth = self.board.occupied_count(),
            "Cancellation observed, generating splits"
        );
        let children = self.generate_splits();
        self.report(SolveOutcome::Split { children })
    }

    fn report(&mut self, outcome: SolveOutcome) -> SolveReport {
        SolveReport {
            outcome,
            fingerprint: self.fingerprint,
            best_depth: self.best_depth,
            best_board: self.best_board.take(),
        }
    }
}
