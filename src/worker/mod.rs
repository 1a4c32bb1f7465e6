//! Worker side of the search: parallel lanes that lease jobs, run the
//! solver within the assigned time budget and report back.
//!
//! # Components
//!
//! - [`Worker`]: owns the lanes of one process
//! - [`Lane`]: one request, solve, report loop with its own worker id
//! - [`HeartbeatSender`]: keeps a lane's lease alive while it searches
//!
//! # Lane flow
//!
//! 1. Request a job; on "no work" wait a jittered idle interval
//! 2. Start heartbeats and a deadline timer for the job's time budget
//! 3. Run the solver on a blocking thread until it finishes or the deadline
//!    cancels it
//! 4. Report a split, a solution or an exhausted search
//!
//! Lanes share nothing but the tile set and the coordinator client.

pub mod heartbeat;
pub mod lane;

pub use heartbeat::HeartbeatSender;
pub use lane::{idle_backoff, Lane, LaneStep};

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::CoordinatorClient;
use crate::config::WorkerConfig;
use crate::puzzle::TileSet;

pub struct Worker {
    id: Uuid,
    client: Arc<dyn CoordinatorClient>,
    tiles: Arc<TileSet>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(client: Arc<dyn CoordinatorClient>, tiles: Arc<TileSet>, config: WorkerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            tiles,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Worker id reported by lane `index`.
    pub fn lane_id(&self, index: usize) -> String {
        format!("{}-{}", self.id, index)
    }

    pub fn lanes(&self) -> Vec<Lane> {
        (0..self.config.lanes)
            .map(|i| {
                Lane::new(
                    self.lane_id(i),
                    Arc::clone(&self.client),
                    Arc::clone(&self.tiles),
                    self.config.clone(),
                )
            })
            .collect()
    }

    /// Run every lane until `shutdown` is cancelled and all lanes have
    /// drained.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            worker = %self.id,
            lanes = self.config.lanes,
            server = %self.config.server_url,
            "Worker started"
        );

        let mut set = JoinSet::new();
        for lane in self.lanes() {
            set.spawn(lane.run(shutdown.clone()));
        }
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                tracing::error!(worker = %self.id, error = %e, "Lane task panicked");
            }
        }

        tracing::info!(worker = %self.id, "Worker stopped");
    }
}
