use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where the puzzle definition lives.
#[derive(Debug, Clone)]
pub struct PuzzleConfig {
    /// Tile definitions (`id,east,south,west,north`).
    pub tiles_path: PathBuf,
    /// Optional fixed placements for the seed job.
    pub hints_path: Option<PathBuf>,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            tiles_path: PathBuf::from("data/eternity2_256.csv"),
            hints_path: Some(PathBuf::from("data/eternity2_256_all_hints.csv")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub listen_addr: SocketAddr,
    pub puzzle: PuzzleConfig,
    /// A lease with no heartbeat for this long is reclaimed.
    pub lease_timeout: Duration,
    /// Period of the zombie sweep.
    pub sweep_interval: Duration,
    /// Privileged override accepted on reports and solution promotion.
    pub admin_token: Option<String>,
    /// Job store snapshot; `None` keeps the job tree in memory only.
    pub state_path: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5210)),
            puzzle: PuzzleConfig::default(),
            lease_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
            admin_token: None,
            state_path: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }
}

/// CPU budget presets for a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerProfile {
    /// One eighth of the cores.
    Background,
    /// Half of the cores.
    Balanced,
    /// Every core.
    Turbo,
}

impl PowerProfile {
    pub fn lanes(self, cpus: usize) -> usize {
        let lanes = match self {
            PowerProfile::Background => cpus / 8,
            PowerProfile::Balanced => cpus / 2,
            PowerProfile::Turbo => cpus,
        };
        lanes.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Coordinator base URL, e.g. `http://127.0.0.1:5210`.
    pub server_url: String,
    /// Local tile definitions; `None` fetches the coordinator's tile set.
    pub tiles_path: Option<PathBuf>,
    /// Parallel search lanes.
    pub lanes: usize,
    pub heartbeat_interval: Duration,
    /// Wait bounds after a "no work" answer.
    pub idle_wait_min: Duration,
    pub idle_wait_max: Duration,
    /// Fixed delay between attempts of a failed coordinator call.
    pub retry_delay: Duration,
    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5210".to_string(),
            tiles_path: None,
            lanes: 1,
            heartbeat_interval: Duration::from_secs(30),
            idle_wait_min: Duration::from_secs(8),
            idle_wait_max: Duration::from_secs(12),
            retry_delay: Duration::from_secs(2),
            max_retries: 5,
        }
    }
}

impl WorkerConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes.max(1);
        self
    }

    pub fn with_profile(self, profile: PowerProfile, cpus: usize) -> Self {
        self.with_lanes(profile.lanes(cpus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_config_default() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:5210");
        assert_eq!(cfg.lease_timeout, Duration::from_secs(60));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
        assert!(cfg.admin_token.is_none());
        assert!(cfg.state_path.is_none());
        assert_eq!(
            cfg.puzzle.tiles_path,
            PathBuf::from("data/eternity2_256.csv")
        );
    }

    #[test]
    fn coordinator_config_builders() {
        let addr: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let cfg = CoordinatorConfig::new(addr)
            .with_admin_token("secret")
            .with_lease_timeout(Duration::from_secs(5))
            .with_state_path("state/jobs.json");
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.state_path, Some(PathBuf::from("state/jobs.json")));
        assert_eq!(cfg.admin_token.as_deref(), Some("secret"));
        assert_eq!(cfg.lease_timeout, Duration::from_secs(5));
    }

    #[test]
    fn worker_config_default() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.server_url, "http://127.0.0.1:5210");
        assert_eq!(cfg.lanes, 1);
        assert!(cfg.tiles_path.is_none());
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert!(cfg.idle_wait_min <= cfg.idle_wait_max);
    }

    #[test]
    fn power_profile_lanes() {
        assert_eq!(PowerProfile::Background.lanes(16), 2);
        assert_eq!(PowerProfile::Balanced.lanes(16), 8);
        assert_eq!(PowerProfile::Turbo.lanes(16), 16);
    }

    #[test]
    fn power_profile_never_zero() {
        assert_eq!(PowerProfile::Background.lanes(4), 1);
        assert_eq!(PowerProfile::Balanced.lanes(1), 1);
        assert_eq!(PowerProfile::Turbo.lanes(0), 1);
    }

    #[test]
    fn worker_config_with_profile() {
        let cfg = WorkerConfig::new("http://coord:5210").with_profile(PowerProfile::Balanced, 12);
        assert_eq!(cfg.server_url, "http://coord:5210");
        assert_eq!(cfg.lanes, 6);
    }

    #[test]
    fn worker_config_lanes_floor() {
        let cfg = WorkerConfig::default().with_lanes(0);
        assert_eq!(cfg.lanes, 1);
    }
}
