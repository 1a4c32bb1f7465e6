use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::scheduler::job::{JobId, JobStatus};
use crate::scheduler::store::{Condition, JobStore, Update};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Returns leases whose holder stopped sending heartbeats.
///
/// Reclaiming is unilateral: the previous holder is not told, and its later
/// split or outcome report fails the first-write-wins check.
pub struct ZombieReaper {
    store: Arc<dyn JobStore>,
    lease_timeout: Duration,
    interval: Duration,
}

impl ZombieReaper {
    /// `interval` is clamped to at least one millisecond.
    pub fn new(store: Arc<dyn JobStore>, lease_timeout: Duration, interval: Duration) -> Self {
        Self {
            store,
            lease_timeout,
            interval: interval.max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Reset every `Assigned` job whose heartbeat is missing or older than
    /// the lease timeout at `now`. Returns the reclaimed ids.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<JobId>> {
        let timeout = chrono::Duration::from_std(self.lease_timeout)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(timeout).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let condition = Condition::LeaseExpired(cutoff);

        let candidates = self.store.scan(&|job| condition.holds(job))?;
        let mut reclaimed = Vec::with_capacity(candidates.len());
        for job in candidates {
            // Re-checked under the store's write so a heartbeat that landed
            // after the scan keeps its lease.
            match self.store.update_if(job.id, condition, &mut |j| {
                j.release(JobStatus::Pending);
            })? {
                Update::Applied(_) => {
                    tracing::debug!(job_id = job.id, worker_id = ?job.assigned_worker, "Lease reclaimed");
                    reclaimed.push(job.id);
                }
                Update::Rejected(_) => {}
            }
        }

        if !reclaimed.is_empty() {
            tracing::info!(count = reclaimed.len(), "Cleaned up zombie jobs");
        }
        Ok(reclaimed)
    }

    /// Sweep every interval until `shutdown` is cancelled. Sweep errors are
    /// logged and the loop continues.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Zombie reaper stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep(Utc::now()) {
                        tracing::error!(error = %e, "Error cleaning zombie jobs");
                    }
                }
            }
        }
    }
}
