use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use eternity_grid::api::{decode_b64, HttpClient, StatsDto};
use eternity_grid::config::{CoordinatorConfig, PowerProfile, PuzzleConfig, WorkerConfig};
use eternity_grid::node::CoordinatorNode;
use eternity_grid::puzzle::{codec, loader, BOARD_SIZE};
use eternity_grid::shutdown::install_shutdown_handler;
use eternity_grid::worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "eternity-grid")]
#[command(version)]
#[command(about = "Distributed exhaustive search for a 16x16 edge-matching puzzle")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the coordinator
    Server(ServerArgs),

    /// Start a worker with one or more search lanes
    Worker(WorkerArgs),

    /// Show search progress
    Stats {
        #[command(flatten)]
        client: ClientArgs,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Port to listen on
    #[arg(long, default_value = "5210")]
    port: u16,

    /// Tile definitions CSV
    #[arg(long, default_value = "data/eternity2_256.csv")]
    tiles: PathBuf,

    /// Hint placements CSV (missing file means no hints)
    #[arg(long, default_value = "data/eternity2_256_all_hints.csv")]
    hints: PathBuf,

    /// Seconds without a heartbeat before a lease is reclaimed
    #[arg(long, default_value = "60")]
    lease_timeout_secs: u64,

    /// Seconds between zombie sweeps
    #[arg(long, default_value = "60")]
    sweep_interval_secs: u64,

    /// Token that bypasses quorum validation and promotes solutions
    #[arg(long, env = "ADMIN_TOKEN")]
    admin_token: Option<String>,

    /// Job store snapshot file; the job tree is kept in memory only if unset
    #[arg(long)]
    state: Option<PathBuf>,
}

// =============================================================================
// Worker Arguments
// =============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    Background,
    Balanced,
    Turbo,
}

impl From<ProfileArg> for PowerProfile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Background => PowerProfile::Background,
            ProfileArg::Balanced => PowerProfile::Balanced,
            ProfileArg::Turbo => PowerProfile::Turbo,
        }
    }
}

#[derive(Parser, Debug)]
struct WorkerArgs {
    /// Coordinator address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:5210")]
    addr: String,

    /// Tile definitions CSV; fetched from the coordinator if unset
    #[arg(long)]
    tiles: Option<PathBuf>,

    /// Number of parallel search lanes
    #[arg(long, conflicts_with = "profile")]
    lanes: Option<usize>,

    /// CPU budget preset, used when --lanes is not given
    #[arg(long, default_value = "balanced")]
    profile: ProfileArg,

    /// Seconds between lease heartbeats
    #[arg(long, default_value = "30")]
    heartbeat_interval_secs: u64,
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Coordinator address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:5210")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

// =============================================================================
// Server / Worker
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    let config = CoordinatorConfig {
        listen_addr,
        puzzle: PuzzleConfig {
            tiles_path: args.tiles,
            hints_path: Some(args.hints),
        },
        lease_timeout: Duration::from_secs(args.lease_timeout_secs),
        sweep_interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
        admin_token: args.admin_token,
        state_path: args.state,
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        lease_timeout_secs = args.lease_timeout_secs,
        sweep_interval_secs = args.sweep_interval_secs,
        admin = config.admin_token.is_some(),
        state = ?config.state_path,
        "Starting eternity-grid coordinator"
    );

    let shutdown = install_shutdown_handler()?;
    let node = CoordinatorNode::open(config)?;
    node.run(shutdown).await?;
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut config = WorkerConfig::new(args.addr.clone());
    config.tiles_path = args.tiles;
    config.heartbeat_interval = Duration::from_secs(args.heartbeat_interval_secs.max(1));
    let config = match args.lanes {
        Some(lanes) => config.with_lanes(lanes),
        None => config.with_profile(args.profile.into(), cpus),
    };

    let client = Arc::new(HttpClient::new(&config.server_url)?);
    let tiles = match &config.tiles_path {
        Some(path) => loader::load_tiles(path)?,
        None => client.tiles().await?,
    };
    let tiles = Arc::new(tiles);

    tracing::info!(
        server = %config.server_url,
        lanes = config.lanes,
        cpus,
        tiles = tiles.len(),
        "Starting eternity-grid worker"
    );

    let shutdown = install_shutdown_handler()?;
    Worker::new(client, tiles, config).run(shutdown).await;
    Ok(())
}

// =============================================================================
// Stats
// =============================================================================

/// Board as a grid of tile ids, `.` for empty cells.
fn render_board(payload: &str) -> Option<String> {
    let bytes = decode_b64(payload).ok()?;
    let placements = codec::decode(&bytes).ok()?;
    let mut grid = vec![0u16; BOARD_SIZE * BOARD_SIZE];
    for p in placements {
        grid[p.position as usize] = p.tile_id;
    }
    let rows: Vec<String> = grid
        .chunks(BOARD_SIZE)
        .map(|row| {
            row.iter()
                .map(|&id| {
                    if id == 0 {
                        format!("{:>4}", ".")
                    } else {
                        format!("{:>4}", id)
                    }
                })
                .collect::<String>()
        })
        .collect();
    Some(rows.join("\n"))
}

fn print_stats(stats: &StatsDto) {
    println!("Search Progress");
    println!("{}", "=".repeat(40));
    println!("Total Jobs:      {}", stats.total_jobs);
    println!("Pending:         {}", stats.pending_jobs);
    println!("Assigned:        {}", stats.assigned_jobs);
    println!("Split:           {}", stats.split_parent_jobs);
    println!("Completed:       {}", stats.completed_jobs);
    println!("Solved:          {}", stats.solved_jobs);
    println!("Nodes Visited:   {}", stats.total_nodes_visited);
    println!("Best Depth:      {}/{}", stats.best_depth, BOARD_SIZE * BOARD_SIZE);
    println!("Active Workers:  {}", stats.active_workers);

    if let Some(board) = stats.best_board.as_deref().and_then(render_board) {
        println!();
        println!("Best Board:");
        println!("{}", board);
    }
}

async fn handle_stats(client: &ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let http = HttpClient::new(&client.addr)?;
    let stats = http.stats().await?;
    match client.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Table => print_stats(&stats),
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await?,
        Commands::Worker(worker_args) => run_worker(worker_args).await?,
        Commands::Stats { client } => {
            if let Err(e) = handle_stats(&client).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
