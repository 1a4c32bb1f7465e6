//! Converting an interrupted search into child boards.
//!
//! Generation starts at the deepest frontier the attempt reached. At each
//! stack entry it offers every legal choice after the entry's cursor (earlier
//! choices are already exhausted), then undoes that entry's placement and
//! moves to the previous frontier, until the starting board is restored.
//! The children together cover exactly the branches this attempt left
//! unfinished.

use crate::puzzle::cell_of;
use crate::puzzle::codec::encode_board;
use crate::solver::search::Solver;
use crate::solver::MAX_BACKTRACK_STEPS;

impl Solver {
    /// Unwind the whole stack, collecting one encoded child per untried legal
    /// `(tile, rotation)`. Leaves the board at its starting state. An empty
    /// result means the job is a dead end.
    pub(super) fn generate_splits(&mut self) -> Vec<Vec<u8>> {
        let total = self.tiles.len() * 4;
        let mut children = Vec::new();
        let mut steps = 0usize;

        while let Some(frame) = self.stack.pop() {
            let (row, col) = cell_of(frame.position);
            if let Some(idx) = frame.placed {
                self.board.remove(row, col);
                self.used[idx] = false;
            }

            if steps > MAX_BACKTRACK_STEPS {
                tracing::warn!(
                    remaining = self.stack.len() + 1,
                    "Backtrack limit reached during split generation"
                );
                self.unwind_remaining();
                break;
            }

            let before = children.len();
            for choice in frame.cursor..total {
                let idx = choice / 4;
                if self.used[idx] {
                    continue;
                }
                let rotation = (choice % 4) as u8;
                let tile = self.tiles.rotated(idx, rotation);
                if self.board.try_place(row, col, tile, rotation) {
                    children.push(encode_board(&self.board));
                    self.board.remove(row, col);
                }
            }

            tracing::debug!(
                row,
                col,
                cursor = frame.cursor,
                offered = children.len() - before,
                "Split frontier"
            );
            steps += 1;
        }

        tracing::debug!(children = children.len(), steps, "Split generation finished");
        children
    }

    fn unwind_remaining(&mut self) {
        while let Some(frame) = self.stack.pop() {
            if let Some(idx) = frame.placed {
                let (row, col) = cell_of(frame.position);
                self.board.remove(row, col);
                self.used[idx] = false;
            }
        }
    }
}
