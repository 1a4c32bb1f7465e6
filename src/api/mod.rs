//! HTTP/JSON surface of the coordinator and the worker-side client.
//!
//! Boards travel as standard base64 of the binary placement encoding.
//!
//! | Route | Body | Success |
//! |---|---|---|
//! | `POST /api/jobs/request` | [`JobRequestDto`] | `200` [`JobResponseDto`], `204` when idle |
//! | `POST /api/jobs/heartbeat` | [`HeartbeatDto`] | `200`, `409` if not the holder |
//! | `POST /api/jobs/report-split` | [`ReportSplitDto`] | `200` [`SplitAckDto`], `409` |
//! | `POST /api/jobs/report-outcome` | [`ReportOutcomeDto`] | `200` [`ReportAck`](crate::scheduler::ReportAck), `409` |
//! | `GET /api/jobs/stats` | | [`StatsDto`] |
//! | `GET /api/jobs/pieces` | | `[Tile]`, `404` without a tile set |
//! | `GET /api/jobs/:id` | | [`JobView`] |
//! | `GET /api/solutions` | | `[SolutionDto]` |
//! | `POST /api/solutions/:id/verify` | [`VerifyDto`] | [`SolutionDto`], `403` |

pub mod client;
pub mod server;

pub use client::{CoordinatorClient, HttpClient, LocalClient};
pub use server::{router, serve};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{EternityError, Result};
use crate::scheduler::{
    Assignment, Job, JobId, OutcomeReport, Progress, SearchResult, Solution,
    SolutionId, SplitReport, Stats,
};
use crate::solver::Fingerprint;

pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_b64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| EternityError::InvalidPayload(format!("bad base64: {}", e)))
}

fn decode_opt(text: &Option<String>) -> Result<Option<Vec<u8>>> {
    match text.as_deref() {
        None | Some("") => Ok(None),
        Some(t) => decode_b64(t).map(Some),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequestDto {
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponseDto {
    pub job_id: JobId,
    pub board: String,
    pub time_limit_secs: u64,
}

impl From<Assignment> for JobResponseDto {
    fn from(a: Assignment) -> Self {
        Self {
            job_id: a.job_id,
            board: encode_b64(&a.board),
            time_limit_secs: a.time_limit.as_secs(),
        }
    }
}

impl JobResponseDto {
    pub fn into_assignment(self) -> Result<Assignment> {
        Ok(Assignment {
            job_id: self.job_id,
            board: decode_b64(&self.board)?,
            time_limit: std::time::Duration::from_secs(self.time_limit_secs),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatDto {
    pub job_id: JobId,
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSplitDto {
    pub job_id: JobId,
    pub worker_id: String,
    pub children: Vec<String>,
    pub nodes_visited: u64,
    pub leaf_checksum: u64,
    pub best_depth: usize,
    #[serde(default)]
    pub best_board: Option<String>,
}

impl From<&SplitReport> for ReportSplitDto {
    fn from(r: &SplitReport) -> Self {
        Self {
            job_id: r.job_id,
            worker_id: r.worker_id.clone(),
            children: r.children.iter().map(|c| encode_b64(c)).collect(),
            nodes_visited: r.progress.fingerprint.nodes_visited,
            leaf_checksum: r.progress.fingerprint.leaf_checksum,
            best_depth: r.progress.best_depth,
            best_board: r.progress.best_board.as_deref().map(encode_b64),
        }
    }
}

impl ReportSplitDto {
    pub fn into_report(self) -> Result<SplitReport> {
        let children = self
            .children
            .iter()
            .map(|c| decode_b64(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(SplitReport {
            job_id: self.job_id,
            worker_id: self.worker_id,
            children,
            progress: Progress {
                fingerprint: Fingerprint {
                    nodes_visited: self.nodes_visited,
                    leaf_checksum: self.leaf_checksum,
                },
                best_depth: self.best_depth,
                best_board: decode_opt(&self.best_board)?,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultDto {
    Solved { solution: String },
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutcomeDto {
    pub job_id: JobId,
    pub worker_id: String,
    pub result: ResultDto,
    pub nodes_visited: u64,
    pub leaf_checksum: u64,
    pub best_depth: usize,
    #[serde(default)]
    pub best_board: Option<String>,
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl From<&OutcomeReport> for ReportOutcomeDto {
    fn from(r: &OutcomeReport) -> Self {
        let result = match &r.result {
            SearchResult::Solved { solution } => ResultDto::Solved {
                solution: encode_b64(solution),
            },
            SearchResult::Exhausted => ResultDto::Exhausted,
        };
        Self {
            job_id: r.job_id,
            worker_id: r.worker_id.clone(),
            result,
            nodes_visited: r.progress.fingerprint.nodes_visited,
            leaf_checksum: r.progress.fingerprint.leaf_checksum,
            best_depth: r.progress.best_depth,
            best_board: r.progress.best_board.as_deref().map(encode_b64),
            admin_token: r.admin_token.clone(),
        }
    }
}

impl ReportOutcomeDto {
    pub fn into_report(self) -> Result<OutcomeReport> {
        let result = match &self.result {
            ResultDto::Solved { solution } => SearchResult::Solved {
                solution: decode_b64(solution)?,
            },
            ResultDto::Exhausted => SearchResult::Exhausted,
        };
        Ok(OutcomeReport {
            job_id: self.job_id,
            worker_id: self.worker_id,
            result,
            progress: Progress {
                fingerprint: Fingerprint {
                    nodes_visited: self.nodes_visited,
                    leaf_checksum: self.leaf_checksum,
                },
                best_depth: self.best_depth,
                best_board: decode_opt(&self.best_board)?,
            },
            admin_token: self.admin_token,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitAckDto {
    pub children: Vec<JobId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsDto {
    pub total_jobs: usize,
    pub pending_jobs: usize,
    pub assigned_jobs: usize,
    pub completed_jobs: usize,
    pub split_parent_jobs: usize,
    pub solved_jobs: usize,
    pub total_nodes_visited: u64,
    pub best_depth: usize,
    pub active_workers: usize,
    pub best_board: Option<String>,
}

impl From<Stats> for StatsDto {
    fn from(s: Stats) -> Self {
        Self {
            total_jobs: s.total_jobs,
            pending_jobs: s.pending_jobs,
            assigned_jobs: s.assigned_jobs,
            completed_jobs: s.completed_jobs,
            split_parent_jobs: s.split_parent_jobs,
            solved_jobs: s.solved_jobs,
            total_nodes_visited: s.total_nodes_visited,
            best_depth: s.best_depth,
            active_workers: s.active_workers,
            best_board: s.best_board.as_deref().map(encode_b64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub status: String,
    pub board: String,
    pub parent_job_id: Option<JobId>,
    pub assigned_worker: Option<String>,
    pub last_heartbeat_ms: Option<i64>,
    pub nodes_visited: u64,
    pub leaf_checksum: u64,
    pub validation_count: u8,
    pub first_worker: Option<String>,
    pub second_worker: Option<String>,
    pub max_depth_found: usize,
    pub best_board: Option<String>,
    pub is_verified: bool,
    pub created_at_ms: i64,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status.to_string(),
            board: encode_b64(&job.board_payload),
            parent_job_id: job.parent_job_id,
            assigned_worker: job.assigned_worker,
            last_heartbeat_ms: job.last_heartbeat.map(|t| t.timestamp_millis()),
            nodes_visited: job.nodes_visited,
            leaf_checksum: job.leaf_checksum,
            validation_count: job.validation_count,
            first_worker: job.first_worker,
            second_worker: job.second_worker,
            max_depth_found: job.max_depth_found,
            best_board: job.best_board_state.as_deref().map(encode_b64),
            is_verified: job.is_verified,
            created_at_ms: job.created_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionDto {
    pub id: SolutionId,
    pub job_id: JobId,
    pub board: String,
    pub found_by: String,
    pub verified: bool,
    pub found_at_ms: i64,
}

impl From<Solution> for SolutionDto {
    fn from(s: Solution) -> Self {
        Self {
            id: s.id,
            job_id: s.job_id,
            board: encode_b64(&s.board),
            found_by: s.found_by,
            verified: s.verified,
            found_at_ms: s.found_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyDto {
    pub admin_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
