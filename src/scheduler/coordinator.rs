use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{EternityError, Result};
use crate::puzzle::codec::{self, MAX_PAYLOAD_LEN};
use crate::puzzle::{Board, TileSet, CELL_COUNT};
use crate::scheduler::job::{Job, JobId, JobStatus, NewJob, Solution, SolutionId};
use crate::scheduler::report::{
    Assignment, OutcomeReport, Progress, ReportAck, SearchResult, SplitReport,
};
use crate::scheduler::store::{Condition, JobStore, NewSolution, Update};

/// Budget when fewer than [`SMALL_BACKLOG`] jobs are pending: split fast to
/// create parallelism.
pub const SHORT_TIME_LIMIT: Duration = Duration::from_secs(60);
pub const MEDIUM_TIME_LIMIT: Duration = Duration::from_secs(300);
/// Budget when at least [`LARGE_BACKLOG`] jobs are pending: explore deep.
pub const LONG_TIME_LIMIT: Duration = Duration::from_secs(600);

pub const SMALL_BACKLOG: usize = 4;
pub const LARGE_BACKLOG: usize = 20;

/// Time budget for a job given the number of jobs still pending.
pub fn time_limit_for_backlog(pending: usize) -> Duration {
    if pending < SMALL_BACKLOG {
        SHORT_TIME_LIMIT
    } else if pending < LARGE_BACKLOG {
        MEDIUM_TIME_LIMIT
    } else {
        LONG_TIME_LIMIT
    }
}

/// Aggregate progress across the job tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total_jobs: usize,
    pub pending_jobs: usize,
    pub assigned_jobs: usize,
    pub completed_jobs: usize,
    pub split_parent_jobs: usize,
    pub solved_jobs: usize,
    pub total_nodes_visited: u64,
    pub best_depth: usize,
    pub active_workers: usize,
    pub best_board: Option<Vec<u8>>,
}

/// The job coordination protocol.
///
/// Assignment is serialized by a process-wide lock around the store's
/// claim; every other operation is a conditional write on one job (or one
/// atomic split), so a report from a worker that lost its lease is rejected
/// without side effects.
pub struct Coordinator {
    store: Arc<dyn JobStore>,
    assign_lock: Mutex<()>,
    admin_token: Option<String>,
    tiles: Option<Arc<TileSet>>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            assign_lock: Mutex::new(()),
            admin_token: None,
            tiles: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Check reported solutions against the tile set.
    pub fn with_tiles(mut self, tiles: Arc<TileSet>) -> Self {
        self.tiles = Some(tiles);
        self
    }

    /// Tile set solutions are checked against, when configured.
    pub fn tiles(&self) -> Option<&Arc<TileSet>> {
        self.tiles.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Insert the root job if the store is empty. Returns its id when seeded.
    pub fn seed(&self, board: &Board) -> Result<Option<JobId>> {
        if !self.store.is_empty()? {
            return Ok(None);
        }
        let id = self.store.insert(NewJob::seed(codec::encode_board(board)))?;
        tracing::info!(job_id = id, hints = board.occupied_count(), "Seeded root job");
        Ok(Some(id))
    }

    pub fn job(&self, id: JobId) -> Result<Job> {
        self.store.get(id)?.ok_or(EternityError::JobNotFound(id))
    }

    /// Lease the next job to `worker_id`, or `None` when no work is pending.
    pub async fn request_job(&self, worker_id: &str) -> Result<Option<Assignment>> {
        let _guard = self.assign_lock.lock().await;

        let Some(job) = self.store.claim_next_pending(worker_id, Utc::now())? else {
            tracing::debug!(worker_id, "No pending jobs");
            return Ok(None);
        };
        let backlog = self.store.count_by_status(JobStatus::Pending)?;
        let time_limit = time_limit_for_backlog(backlog);

        tracing::info!(
            job_id = job.id,
            worker_id,
            backlog,
            time_limit_secs = time_limit.as_secs(),
            "Job assigned"
        );
        Ok(Some(Assignment {
            job_id: job.id,
            board: job.board_payload,
            time_limit,
        }))
    }

    /// Refresh the lease, only for its current holder.
    pub fn heartbeat(&self, job_id: JobId, worker_id: &str) -> Result<()> {
        let now = Utc::now();
        match self.store.update_if(job_id, Condition::AssignedTo(worker_id), &mut |job| {
            job.last_heartbeat = Some(now);
        })? {
            Update::Applied(_) => {
                tracing::debug!(job_id, worker_id, "Heartbeat");
                Ok(())
            }
            Update::Rejected(job) => {
                tracing::debug!(
                    job_id,
                    worker_id,
                    status = %job.status,
                    holder = ?job.assigned_worker,
                    "Heartbeat rejected"
                );
                Err(lease_conflict(job_id, worker_id))
            }
        }
    }

    /// Accept a split: the parent becomes `SplitParent` and each child board
    /// becomes a `Pending` job, all at once.
    pub fn report_split(&self, report: SplitReport) -> Result<Vec<JobId>> {
        let SplitReport {
            job_id,
            worker_id,
            children,
            progress,
        } = report;

        if children.is_empty() {
            return Err(EternityError::InvalidPayload(
                "split report without children".to_string(),
            ));
        }
        for child in &children {
            validate_payload(child)?;
        }
        validate_progress(&progress)?;

        let count = children.len();
        let new_jobs = children
            .into_iter()
            .map(|board| NewJob::child(job_id, board))
            .collect();

        let update = self.store.split(
            job_id,
            Condition::AssignedTo(&worker_id),
            &mut |job| {
                job.release(JobStatus::SplitParent);
                job.record_fingerprint(progress.fingerprint);
                job.ratchet_best(progress.best_depth, progress.best_board.as_deref());
            },
            new_jobs,
        )?;

        match update {
            Update::Applied((parent, child_ids)) => {
                tracing::info!(
                    job_id,
                    worker_id = %worker_id,
                    children = count,
                    nodes = progress.fingerprint.nodes_visited,
                    best_depth = parent.max_depth_found,
                    "Job split"
                );
                Ok(child_ids)
            }
            Update::Rejected(job) => {
                tracing::warn!(
                    job_id,
                    worker_id = %worker_id,
                    status = %job.status,
                    "Split rejected, job no longer held by reporter"
                );
                Err(lease_conflict(job_id, &worker_id))
            }
        }
    }

    /// Accept a finished exploration and apply solution recording or quorum
    /// validation.
    pub fn report_outcome(&self, report: OutcomeReport) -> Result<ReportAck> {
        validate_progress(&report.progress)?;
        let is_admin = self.is_admin(report.admin_token.as_deref());

        match &report.result {
            SearchResult::Solved { solution } => {
                self.validate_solution(solution)?;
                self.accept_solution(&report, solution, is_admin)
            }
            SearchResult::Exhausted => self.accept_exhausted(&report, is_admin),
        }
    }

    fn accept_solution(
        &self,
        report: &OutcomeReport,
        solution: &[u8],
        is_admin: bool,
    ) -> Result<ReportAck> {
        let job_id = report.job_id;
        let fingerprint = report.progress.fingerprint;
        let update = self.store.record_solution(
            job_id,
            Condition::AssignedTo(&report.worker_id),
            &mut |job| {
                job.release(JobStatus::Solved);
                job.record_fingerprint(fingerprint);
                job.ratchet_best(CELL_COUNT, Some(solution));
                job.is_verified = is_admin;
            },
            NewSolution {
                board: solution.to_vec(),
                found_by: report.worker_id.clone(),
                verified: is_admin,
            },
        )?;

        let solution_id = match update {
            Update::Applied((_, solution_id)) => solution_id,
            Update::Rejected(job) => return Err(self.reject(job, &report.worker_id)),
        };
        tracing::info!(
            job_id,
            solution_id,
            worker_id = %report.worker_id,
            verified = is_admin,
            "Solution found"
        );
        Ok(ReportAck::Solved { solution_id })
    }

    fn accept_exhausted(&self, report: &OutcomeReport, is_admin: bool) -> Result<ReportAck> {
        let job_id = report.job_id;
        let worker_id = report.worker_id.as_str();
        let progress = &report.progress;
        let mut ack = ReportAck::AwaitingQuorum;
        let mut previous_worker = None;

        let update = self
            .store
            .update_if(job_id, Condition::AssignedTo(worker_id), &mut |job| {
                job.ratchet_best(progress.best_depth, progress.best_board.as_deref());

                if is_admin {
                    job.release(JobStatus::Completed);
                    job.is_verified = true;
                    job.validation_count = 2;
                    ack = ReportAck::Verified;
                    return;
                }

                if job.validation_count == 0 {
                    job.record_fingerprint(progress.fingerprint);
                    job.validation_count = 1;
                    job.first_worker = Some(worker_id.to_string());
                    job.release(JobStatus::Pending);
                    ack = ReportAck::AwaitingQuorum;
                } else if job.fingerprint() == progress.fingerprint {
                    job.validation_count = 2;
                    job.second_worker = Some(worker_id.to_string());
                    job.is_verified = true;
                    job.release(JobStatus::Completed);
                    ack = ReportAck::Verified;
                } else {
                    previous_worker = job.first_worker.take();
                    job.validation_count = 0;
                    job.second_worker = None;
                    job.release(JobStatus::Pending);
                    ack = ReportAck::Conflict;
                }
            })?;

        if let Update::Rejected(job) = update {
            return Err(self.reject(job, worker_id));
        }

        match ack {
            ReportAck::Conflict => tracing::warn!(
                job_id,
                first_worker = ?previous_worker,
                second_worker = worker_id,
                nodes = progress.fingerprint.nodes_visited,
                checksum = progress.fingerprint.leaf_checksum,
                "Validation conflict, job requeued"
            ),
            ReportAck::Verified => tracing::info!(
                job_id,
                worker_id,
                admin = is_admin,
                "Job verified exhausted"
            ),
            _ => tracing::info!(
                job_id,
                worker_id,
                nodes = progress.fingerprint.nodes_visited,
                "Job exhausted, awaiting second attempt"
            ),
        }
        Ok(ack)
    }

    fn reject(&self, job: Job, worker_id: &str) -> EternityError {
        tracing::warn!(
            job_id = job.id,
            worker_id,
            status = %job.status,
            holder = ?job.assigned_worker,
            "Report rejected, job no longer held by reporter"
        );
        lease_conflict(job.id, worker_id)
    }

    fn is_admin(&self, token: Option<&str>) -> bool {
        matches!((self.admin_token.as_deref(), token), (Some(expected), Some(given)) if expected == given)
    }

    fn validate_solution(&self, solution: &[u8]) -> Result<()> {
        let placements = codec::decode(solution)?;
        if placements.len() != CELL_COUNT {
            return Err(EternityError::InvalidPayload(format!(
                "solution has {} of {} cells",
                placements.len(),
                CELL_COUNT
            )));
        }
        if let Some(tiles) = &self.tiles {
            let board = Board::from_placements(tiles, &placements)?;
            if !board.is_full() {
                return Err(EternityError::InvalidBoard("solution not full".to_string()));
            }
        }
        Ok(())
    }

    pub fn solutions(&self) -> Result<Vec<Solution>> {
        self.store.solutions()
    }

    /// Manually promote a solution; requires the admin token.
    pub fn verify_solution(&self, id: SolutionId, admin_token: Option<&str>) -> Result<Solution> {
        if !self.is_admin(admin_token) {
            return Err(EternityError::Unauthorized);
        }
        let solution = self.store.set_solution_verified(id)?;
        self.store
            .update_if(solution.job_id, Condition::Always, &mut |job| {
                job.is_verified = true;
            })?;
        tracing::info!(solution_id = id, job_id = solution.job_id, "Solution verified");
        Ok(solution)
    }

    pub fn stats(&self) -> Result<Stats> {
        let jobs = self.store.scan(&|_| true)?;
        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();

        let best = jobs
            .iter()
            .filter(|j| j.max_depth_found > 0)
            .fold(None::<&Job>, |best, j| match best {
                Some(b) if b.max_depth_found >= j.max_depth_found => Some(b),
                _ => Some(j),
            })
            .or_else(|| jobs.first());

        let active_workers = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Assigned)
            .filter_map(|j| j.assigned_worker.as_deref())
            .collect::<HashSet<_>>()
            .len();

        Ok(Stats {
            total_jobs: jobs.len(),
            pending_jobs: count(JobStatus::Pending),
            assigned_jobs: count(JobStatus::Assigned),
            completed_jobs: count(JobStatus::Completed),
            split_parent_jobs: count(JobStatus::SplitParent),
            solved_jobs: count(JobStatus::Solved),
            total_nodes_visited: jobs.iter().map(|j| j.nodes_visited).sum(),
            best_depth: best.map_or(0, |j| j.max_depth_found),
            active_workers,
            best_board: best.map(|j| {
                j.best_board_state
                    .clone()
                    .unwrap_or_else(|| j.board_payload.clone())
            }),
        })
    }
}

fn lease_conflict(job_id: JobId, worker_id: &str) -> EternityError {
    EternityError::LeaseConflict {
        job_id,
        worker_id: worker_id.to_string(),
    }
}

fn validate_payload(payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EternityError::InvalidPayload(format!(
            "board payload of {} bytes",
            payload.len()
        )));
    }
    codec::decode(payload)?;
    Ok(())
}

fn validate_progress(progress: &Progress) -> Result<()> {
    if progress.best_depth > CELL_COUNT {
        return Err(EternityError::InvalidPayload(format!(
            "best depth {} exceeds {}",
            progress.best_depth, CELL_COUNT
        )));
    }
    if let Some(board) = &progress.best_board {
        validate_payload(board)?;
    }
    Ok(())
}
