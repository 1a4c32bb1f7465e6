use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::puzzle::codec::RECORD_LEN;
use crate::solver::Fingerprint;

pub type JobId = u64;
pub type SolutionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Assigned,
    SplitParent,
    Solved,
    Completed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::SplitParent => write!(f, "split_parent"),
            JobStatus::Solved => write!(f, "solved"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A unit of distributable search: a partial board plus its coordination
/// metadata. Jobs are never deleted; terminal jobs stay as an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub board_payload: Vec<u8>,
    pub status: JobStatus,
    /// Lease holder, present only while `Assigned`.
    pub assigned_worker: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub parent_job_id: Option<JobId>,
    /// Fingerprint of the most recent finished exploration.
    pub nodes_visited: u64,
    pub leaf_checksum: u64,
    pub validation_count: u8,
    pub first_worker: Option<String>,
    pub second_worker: Option<String>,
    /// Deepest partial solution seen across all attempts. Never decreases.
    pub max_depth_found: usize,
    pub best_board_state: Option<Vec<u8>>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when inserting a job; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub board_payload: Vec<u8>,
    pub parent_job_id: Option<JobId>,
    pub max_depth_found: usize,
}

impl NewJob {
    /// Root job built from the hint board.
    pub fn seed(board_payload: Vec<u8>) -> Self {
        let max_depth_found = board_payload.len() / RECORD_LEN;
        Self {
            board_payload,
            parent_job_id: None,
            max_depth_found,
        }
    }

    pub fn child(parent: JobId, board_payload: Vec<u8>) -> Self {
        let max_depth_found = board_payload.len() / RECORD_LEN;
        Self {
            board_payload,
            parent_job_id: Some(parent),
            max_depth_found,
        }
    }
}

impl Job {
    pub fn from_new(id: JobId, new: NewJob, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            board_payload: new.board_payload,
            status: JobStatus::Pending,
            assigned_worker: None,
            last_heartbeat: None,
            parent_job_id: new.parent_job_id,
            nodes_visited: 0,
            leaf_checksum: 0,
            validation_count: 0,
            first_worker: None,
            second_worker: None,
            max_depth_found: new.max_depth_found,
            best_board_state: None,
            is_verified: false,
            created_at,
        }
    }

    pub fn is_assigned_to(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Assigned && self.assigned_worker.as_deref() == Some(worker_id)
    }

    pub fn assign(&mut self, worker_id: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Assigned;
        self.assigned_worker = Some(worker_id.to_string());
        self.last_heartbeat = Some(now);
    }

    /// Drop the lease and move to `status`.
    pub fn release(&mut self, status: JobStatus) {
        self.status = status;
        self.assigned_worker = None;
        self.last_heartbeat = None;
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            nodes_visited: self.nodes_visited,
            leaf_checksum: self.leaf_checksum,
        }
    }

    pub fn record_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.nodes_visited = fingerprint.nodes_visited;
        self.leaf_checksum = fingerprint.leaf_checksum;
    }

    /// Raise the best-progress record if `depth` beats it. Returns whether it
    /// moved.
    pub fn ratchet_best(&mut self, depth: usize, board: Option<&[u8]>) -> bool {
        if depth <= self.max_depth_found {
            return false;
        }
        self.max_depth_found = depth;
        if let Some(board) = board {
            self.best_board_state = Some(board.to_vec());
        }
        true
    }
}

/// A complete tiling reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub id: SolutionId,
    pub job_id: JobId,
    pub board: Vec<u8>,
    pub found_by: String,
    pub verified: bool,
    pub found_at: DateTime<Utc>,
}
