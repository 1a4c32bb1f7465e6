
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use eternity_grid::api::{CoordinatorClient, LocalClient};
use eternity_grid::config::WorkerConfig;
use eternity_grid::puzzle::{codec, Board, CELL_COUNT};
use eternity_grid::scheduler::{Coordinator, JobStatus};
use eternity_grid::worker::{HeartbeatSender, Lane, LaneStep, Worker};

use test_harness::{coordinator, generate, generate_unsolvable, Puzzle};

fn config() -> WorkerConfig {
    WorkerConfig {
        heartbeat_interval: Duration::from_millis(20),
        idle_wait_min: Duration::from_millis(10),
        idle_wait_max: Duration::from_millis(20),
        retry_delay: Duration::from_millis(10),
        max_retries: 2,
        ..WorkerConfig::new("in-process")
    }
}

fn last_cells(open: usize) -> Vec<usize> {
    (CELL_COUNT - open..CELL_COUNT).collect()
}

fn setup(puzzle: &Puzzle, seed: &Board) -> (Arc<Coordinator>, Arc<dyn CoordinatorClient>) {
    let coord = Arc::new(coordinator().with_tiles(Arc::clone(&puzzle.tiles)));
    coord.seed(seed).unwrap();
    let client: Arc<dyn CoordinatorClient> = Arc::new(LocalClient::new(Arc::clone(&coord)));
    (coord, client)
}

fn lane(id: &str, client: &Arc<dyn CoordinatorClient>, puzzle: &Puzzle) -> Lane {
    Lane::new(
        id.to_string(),
        Arc::clone(client),
        Arc::clone(&puzzle.tiles),
        config(),
    )
}

#[tokio::test]
async fn test_lane_solves_and_reports() {
    let puzzle = generate(61);
    let (coord, client) = setup(&puzzle, &puzzle.board_without(&last_cells(8)));

    let step = lane("w1", &client, &puzzle)
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        step,
        LaneStep::Finished {
            job_id: 1,
            outcome: "solved"
        }
    );

    let job = coord.job(1).unwrap();
    assert_eq!(job.status, JobStatus::Solved);
    assert_eq!(job.max_depth_found, CELL_COUNT);
    assert!(job.assigned_worker.is_none());

    let solutions = coord.solutions().unwrap();
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].found_by, "w1");
    let placements = codec::decode(&solutions[0].board).unwrap();
    assert!(Board::from_placements(&puzzle.tiles, &placements)
        .unwrap()
        .is_full());
}

#[tokio::test]
async fn test_lane_idle_without_work() {
    let puzzle = generate(62);
    let (_coord, client) = setup(&puzzle, &puzzle.board_without(&last_cells(8)));
    let first = lane("w1", &client, &puzzle);
    let second = lane("w2", &client, &puzzle);

    // w1 holds the only job while w2 asks
    client.request_job("w1").await.unwrap().unwrap();
    let step = second.run_once(&CancellationToken::new()).await.unwrap();
    assert_eq!(step, LaneStep::Idle);
    assert_eq!(first.worker_id(), "w1");
}

#[tokio::test]
async fn test_exhausted_job_verified_by_two_lanes() {
    let puzzle = generate_unsolvable(63);
    let (coord, client) = setup(&puzzle, &puzzle.board_without(&last_cells(6)));
    let never = CancellationToken::new();

    let step = lane("w1", &client, &puzzle).run_once(&never).await.unwrap();
    assert_eq!(
        step,
        LaneStep::Finished {
            job_id: 1,
            outcome: "exhausted"
        }
    );
    let job = coord.job(1).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.validation_count, 1);
    assert_eq!(job.first_worker.as_deref(), Some("w1"));

    lane("w2", &client, &puzzle).run_once(&never).await.unwrap();
    let job = coord.job(1).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.is_verified);
    assert_eq!(job.second_worker.as_deref(), Some("w2"));
}

#[tokio::test]
async fn test_shutdown_hands_back_remainder() {
    let puzzle = generate(64);
    // an empty board cannot be finished before the shutdown lands
    let (coord, client) = setup(&puzzle, &Board::new());
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let step = lane("w1", &client, &puzzle)
        .with_checkpoint_interval(1)
        .run_once(&shutdown)
        .await
        .unwrap();
    assert_eq!(
        step,
        LaneStep::Finished {
            job_id: 1,
            outcome: "split"
        }
    );

    let parent = coord.job(1).unwrap();
    assert_eq!(parent.status, JobStatus::SplitParent);
    assert!(parent.assigned_worker.is_none());

    let stats = coord.stats().unwrap();
    assert!(stats.pending_jobs >= 1);
    assert_eq!(stats.total_jobs, stats.pending_jobs + 1);

    let child = coord.job(2).unwrap();
    assert_eq!(child.parent_job_id, Some(1));
    let placements = codec::decode(&child.board_payload).unwrap();
    assert!(!placements.is_empty());
    Board::from_placements(&puzzle.tiles, &placements).unwrap();
}

#[tokio::test]
async fn test_heartbeat_sender_refreshes_lease() {
    let puzzle = generate(65);
    let (coord, client) = setup(&puzzle, &Board::new());
    let job = client.request_job("w1").await.unwrap().unwrap();
    let granted = coord.job(job.job_id).unwrap().last_heartbeat.unwrap();

    let stop = CancellationToken::new();
    let handle = HeartbeatSender::new(Duration::from_millis(10)).spawn(
        Arc::clone(&client),
        job.job_id,
        "w1".to_string(),
        stop.clone(),
    );
    tokio::time::sleep(Duration::from_millis(80)).await;
    stop.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("heartbeat should stop")
        .unwrap();

    let refreshed = coord.job(job.job_id).unwrap().last_heartbeat.unwrap();
    assert!(refreshed > granted);
}

#[tokio::test]
async fn test_heartbeat_sender_survives_lost_lease() {
    let puzzle = generate(66);
    let (coord, client) = setup(&puzzle, &Board::new());
    let job = client.request_job("w1").await.unwrap().unwrap();

    let stop = CancellationToken::new();
    let handle = HeartbeatSender::new(Duration::from_millis(10)).spawn(
        Arc::clone(&client),
        job.job_id,
        "intruder".to_string(),
        stop.clone(),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop.cancel();
    handle.await.unwrap();

    let current = coord.job(job.job_id).unwrap();
    assert_eq!(current.assigned_worker.as_deref(), Some("w1"));
}

#[test]
fn test_worker_lane_ids() {
    let puzzle = generate(67);
    let client: Arc<dyn CoordinatorClient> = Arc::new(LocalClient::new(Arc::new(coordinator())));
    let worker = Worker::new(client, Arc::clone(&puzzle.tiles), config().with_lanes(3));

    assert_eq!(worker.lane_id(2), format!("{}-2", worker.id()));
    let lanes = worker.lanes();
    assert_eq!(lanes.len(), 3);
    assert_eq!(lanes[0].worker_id(), worker.lane_id(0));
    assert_ne!(lanes[0].worker_id(), lanes[1].worker_id());
}

#[tokio::test]
async fn test_worker_runs_until_shutdown() {
    let puzzle = generate(68);
    let (coord, client) = setup(&puzzle, &puzzle.board_without(&last_cells(8)));
    let worker = Worker::new(client, Arc::clone(&puzzle.tiles), config().with_lanes(2));

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(worker.run(shutdown.clone()));

    let mut solved = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if coord.job(1).unwrap().status == JobStatus::Solved {
            solved = true;
            break;
        }
    }
    assert!(solved);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker should drain on shutdown")
        .unwrap();
}
