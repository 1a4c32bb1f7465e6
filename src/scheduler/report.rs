use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scheduler::job::{JobId, SolutionId};
use crate::solver::Fingerprint;

/// A job handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub job_id: JobId,
    pub board: Vec<u8>,
    pub time_limit: Duration,
}

/// Measurements accompanying every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub fingerprint: Fingerprint,
    pub best_depth: usize,
    pub best_board: Option<Vec<u8>>,
}

/// The time budget ran out and the worker cut its remainder into children.
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub job_id: JobId,
    pub worker_id: String,
    pub children: Vec<Vec<u8>>,
    pub progress: Progress,
}

/// A finished exploration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Solved { solution: Vec<u8> },
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct OutcomeReport {
    pub job_id: JobId,
    pub worker_id: String,
    pub result: SearchResult,
    pub progress: Progress,
    /// Privileged override; bypasses quorum when it matches the configured
    /// admin token.
    pub admin_token: Option<String>,
}

/// What an accepted outcome report did to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ack", rename_all = "snake_case")]
pub enum ReportAck {
    /// Job solved; a solution record was appended.
    Solved { solution_id: SolutionId },
    /// First exhaustive attempt recorded; the job is queued for a second.
    AwaitingQuorum,
    /// Two attempts agreed, or the admin override was used.
    Verified,
    /// Two attempts disagreed; the job starts over from scratch.
    Conflict,
}
