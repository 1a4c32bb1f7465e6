use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api;
use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::puzzle::{loader, TileSet};
use crate::scheduler::{Coordinator, JobStore, MemoryJobStore, ZombieReaper};

/// Coordinator process: job store, protocol, zombie sweep and HTTP API.
pub struct CoordinatorNode {
    pub config: CoordinatorConfig,
    pub coordinator: Arc<Coordinator>,
    store: Arc<dyn JobStore>,
}

impl CoordinatorNode {
    /// Load the puzzle and seed the root job when the store is empty.
    pub fn bootstrap(config: CoordinatorConfig, store: Arc<dyn JobStore>) -> Result<Self> {
        let tiles = Arc::new(loader::load_tiles(&config.puzzle.tiles_path)?);
        tracing::info!(
            path = %config.puzzle.tiles_path.display(),
            tiles = tiles.len(),
            "Loaded tiles"
        );

        let hints = match &config.puzzle.hints_path {
            Some(path) => loader::load_hints(path)?,
            None => Vec::new(),
        };
        Self::with_puzzle(config, store, tiles, &hints)
    }

    /// Like [`bootstrap`](Self::bootstrap) with an in-memory puzzle.
    pub fn with_puzzle(
        config: CoordinatorConfig,
        store: Arc<dyn JobStore>,
        tiles: Arc<TileSet>,
        hints: &[loader::Hint],
    ) -> Result<Self> {
        let coordinator = Coordinator::new(Arc::clone(&store))
            .with_admin_token(config.admin_token.clone())
            .with_tiles(Arc::clone(&tiles));

        let board = loader::seed_board(&tiles, hints);
        if coordinator.seed(&board)?.is_none() {
            tracing::info!("Job store already populated, skipping seed");
        }

        Ok(Self {
            config,
            coordinator: Arc::new(coordinator),
            store,
        })
    }

    /// Bootstrap over the store `config` asks for: the snapshot at
    /// `state_path` when set, otherwise memory only.
    pub fn open(config: CoordinatorConfig) -> Result<Self> {
        let store = match &config.state_path {
            Some(path) => MemoryJobStore::open(path)?,
            None => {
                tracing::warn!("No state path configured, job tree will not survive a restart");
                MemoryJobStore::new()
            }
        };
        Self::bootstrap(config, Arc::new(store))
    }

    /// Run the zombie sweep and serve the API until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let reaper = ZombieReaper::new(
            Arc::clone(&self.store),
            self.config.lease_timeout,
            self.config.sweep_interval,
        );
        let reaper_handle = tokio::spawn(reaper.run(shutdown.clone()));

        let served = api::serve(self.config.listen_addr, self.coordinator, shutdown.clone()).await;

        // The server may have failed on its own; stop the sweep either way.
        shutdown.cancel();
        if let Err(e) = reaper_handle.await {
            tracing::error!(error = %e, "Zombie reaper task failed");
        }
        served
    }
}
