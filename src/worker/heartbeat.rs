use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::CoordinatorClient;
use crate::scheduler::JobId;

/// Keeps one job lease alive while the solver runs.
pub struct HeartbeatSender {
    interval: Duration,
}

impl HeartbeatSender {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Send a heartbeat for `job_id` every interval until `stop` is
    /// cancelled. Failures are logged and otherwise ignored; a lost lease
    /// surfaces when the final report is rejected.
    pub async fn run(
        &self,
        client: Arc<dyn CoordinatorClient>,
        job_id: JobId,
        worker_id: String,
        stop: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(self.interval);
        // The first tick completes immediately; the lease was just granted.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = client.heartbeat(job_id, &worker_id).await {
                        tracing::warn!(job_id, worker_id = %worker_id, error = %e, "Heartbeat failed");
                    }
                }
            }
        }
    }

    pub fn spawn(
        self,
        client: Arc<dyn CoordinatorClient>,
        job_id: JobId,
        worker_id: String,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(client, job_id, worker_id, stop).await })
    }
}
