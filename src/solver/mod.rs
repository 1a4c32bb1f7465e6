//! Time-sliced backtracking search over a partial board.
//!
//! # Architecture
//!
//! The [`Solver`] fills empty cells in row-major order using an explicit
//! stack of choice points rather than native recursion. Each stack entry
//! records:
//! - the cell being filled
//! - a cursor over the `(tile, rotation)` choices for that cell
//! - the choice currently placed there, if any
//!
//! Choices before an entry's cursor have been explored to exhaustion, the
//! placed one is in progress, and those after it are untried. That split is
//! what lets a cancelled search hand its unexplored remainder back as child
//! boards (see [`split`]).
//!
//! # Outcomes
//!
//! 1. [`SolveOutcome::Solved`]: every cell filled, first solution wins
//! 2. [`SolveOutcome::Exhausted`]: no solution below the starting board
//! 3. [`SolveOutcome::Split`]: the deadline fired; the children cover every
//!    branch the attempt did not finish
//!
//! Cancellation is cooperative. The token is polled once every
//! [`CHECKPOINT_INTERVAL`] visited nodes, so a stop lags the deadline by at
//! most one interval of search.

pub mod search;
pub mod split;

pub use search::Solver;

use serde::{Deserialize, Serialize};

/// Node-count interval between cancellation checks.
pub const CHECKPOINT_INTERVAL: u64 = 1 << 20;

/// Upper bound on frontier backtracking while generating splits.
pub const MAX_BACKTRACK_STEPS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic summary of one exploration.
///
/// Two workers that exhaust the same starting board visit the same nodes in
/// the same order, so both fields must agree between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub nodes_visited: u64,
    pub leaf_checksum: u64,
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self {
            nodes_visited: 0,
            leaf_checksum: FNV_OFFSET,
        }
    }
}

impl Fingerprint {
    /// Fold a leaf (dead end or solution) into the checksum. Order matters.
    pub fn fold_leaf(&mut self, position: usize, depth: usize) {
        let key = ((position as u64) << 16) | depth as u64;
        for byte in key.to_le_bytes() {
            self.leaf_checksum ^= u64::from(byte);
            self.leaf_checksum = self.leaf_checksum.wrapping_mul(FNV_PRIME);
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved { board: Vec<u8> },
    Exhausted,
    Split { children: Vec<Vec<u8>> },
}

impl SolveOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            SolveOutcome::Solved { .. } => "solved",
            SolveOutcome::Exhausted => "exhausted",
            SolveOutcome::Split { .. } => "split",
        }
    }
}

/// Outcome plus the progress measured while producing it.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub outcome: SolveOutcome,
    pub fingerprint: Fingerprint,
    /// Most cells occupied at any visited node.
    pub best_depth: usize,
    /// Encoded board at `best_depth`, when the attempt got deeper than its
    /// starting board.
    pub best_board: Option<Vec<u8>>,
}
