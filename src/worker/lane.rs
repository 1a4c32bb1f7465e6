use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::api::CoordinatorClient;
use crate::config::WorkerConfig;
use crate::error::{EternityError, Result};
use crate::puzzle::TileSet;
use crate::scheduler::{Assignment, JobId, OutcomeReport, Progress, SearchResult, SplitReport};
use crate::solver::{SolveOutcome, SolveReport, Solver, CHECKPOINT_INTERVAL};
use crate::worker::heartbeat::HeartbeatSender;

/// What a single pass of a lane did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneStep {
    /// The coordinator had no work.
    Idle,
    /// A job was searched and its result reported (or discarded on a lost
    /// lease).
    Finished { job_id: JobId, outcome: &'static str },
}

/// Random wait inside `[min, max]` so idle lanes don't poll in lockstep.
pub fn idle_backoff(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let mut rng = rand::thread_rng();
    let ms = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}

/// One sequential request, solve, report loop.
pub struct Lane {
    worker_id: String,
    client: Arc<dyn CoordinatorClient>,
    tiles: Arc<TileSet>,
    config: WorkerConfig,
    checkpoint_interval: u64,
}

impl Lane {
    pub fn new(
        worker_id: String,
        client: Arc<dyn CoordinatorClient>,
        tiles: Arc<TileSet>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id,
            client,
            tiles,
            config,
            checkpoint_interval: CHECKPOINT_INTERVAL,
        }
    }

    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Loop until `shutdown` is cancelled. A job in flight when shutdown
    /// arrives is split and its remainder handed back.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(worker_id = %self.worker_id, "Lane started");

        while !shutdown.is_cancelled() {
            let wait = match self.run_once(&shutdown).await {
                Ok(LaneStep::Finished { .. }) => continue,
                Ok(LaneStep::Idle) => {
                    idle_backoff(self.config.idle_wait_min, self.config.idle_wait_max)
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "Lane iteration failed");
                    self.config.idle_wait_min
                }
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Lane stopped");
    }

    /// Request one job, search it within its budget and report the result.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> Result<LaneStep> {
        let assignment = self
            .with_retry("request job", || self.client.request_job(&self.worker_id))
            .await?;
        let Some(assignment) = assignment else {
            tracing::debug!(worker_id = %self.worker_id, "No work available");
            return Ok(LaneStep::Idle);
        };

        let job_id = assignment.job_id;
        let report = self.search(assignment, shutdown).await?;
        let outcome = report.outcome.name();
        self.submit(job_id, report).await?;
        Ok(LaneStep::Finished { job_id, outcome })
    }

    async fn search(
        &self,
        assignment: Assignment,
        shutdown: &CancellationToken,
    ) -> Result<SolveReport> {
        let Assignment {
            job_id,
            board,
            time_limit,
        } = assignment;
        tracing::info!(
            job_id,
            worker_id = %self.worker_id,
            time_limit_secs = time_limit.as_secs(),
            "Job started"
        );

        let mut solver = Solver::new(Arc::clone(&self.tiles), &board)?
            .with_checkpoint_interval(self.checkpoint_interval);

        let stop = CancellationToken::new();
        let heartbeat = HeartbeatSender::new(self.config.heartbeat_interval).spawn(
            Arc::clone(&self.client),
            job_id,
            self.worker_id.clone(),
            stop.clone(),
        );

        let deadline = stop.child_token();
        let timer = {
            let deadline = deadline.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(time_limit) => deadline.cancel(),
                    _ = shutdown.cancelled() => deadline.cancel(),
                    _ = deadline.cancelled() => {}
                }
            })
        };

        let solved = tokio::task::spawn_blocking(move || solver.solve(&deadline)).await;

        stop.cancel();
        let _ = timer.await;
        let _ = heartbeat.await;

        Ok(solved?)
    }

    async fn submit(&self, job_id: JobId, report: SolveReport) -> Result<()> {
        let progress = Progress {
            fingerprint: report.fingerprint,
            best_depth: report.best_depth,
            best_board: report.best_board,
        };
        let fingerprint = report.fingerprint;

        let result = match report.outcome {
            SolveOutcome::Split { children } if !children.is_empty() => {
                let split = SplitReport {
                    job_id,
                    worker_id: self.worker_id.clone(),
                    children,
                    progress,
                };
                self.with_retry("report split", || self.client.report_split(&split))
                    .await
                    .map(|ids| {
                        tracing::info!(
                            job_id,
                            worker_id = %self.worker_id,
                            children = ids.len(),
                            nodes = fingerprint.nodes_visited,
                            "Job split"
                        );
                    })
            }
            outcome => {
                let result = match outcome {
                    SolveOutcome::Solved { board } => SearchResult::Solved { solution: board },
                    // A split with no children means the frontier was empty.
                    _ => SearchResult::Exhausted,
                };
                let solved = matches!(result, SearchResult::Solved { .. });
                let outcome = OutcomeReport {
                    job_id,
                    worker_id: self.worker_id.clone(),
                    result,
                    progress,
                    admin_token: None,
                };
                self.with_retry("report outcome", || self.client.report_outcome(&outcome))
                    .await
                    .map(|ack| {
                        if solved {
                            tracing::info!(job_id, worker_id = %self.worker_id, ?ack, "Solution reported");
                        } else {
                            tracing::info!(
                                job_id,
                                worker_id = %self.worker_id,
                                nodes = fingerprint.nodes_visited,
                                ?ack,
                                "Job exhausted"
                            );
                        }
                    })
            }
        };

        match result {
            Err(EternityError::LeaseConflict { .. }) => {
                tracing::warn!(
                    job_id,
                    worker_id = %self.worker_id,
                    "Lease lost before report, result discarded"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Retry transient coordinator failures with a fixed delay.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        worker_id = %self.worker_id,
                        attempt,
                        error = %e,
                        "Failed to {}, retrying",
                        what
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                other => return other,
            }
        }
    }
}
