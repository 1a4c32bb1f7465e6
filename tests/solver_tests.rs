
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use eternity_grid::puzzle::codec;
use eternity_grid::puzzle::{Board, CELL_COUNT};
use eternity_grid::solver::{Fingerprint, SolveOutcome, Solver};

use test_harness::{
    generate, generate_branching, generate_branching_unsolvable, generate_unsolvable,
};

fn solve(solver: &mut Solver) -> eternity_grid::solver::SolveReport {
    solver.solve(&CancellationToken::new())
}

fn cancelled() -> CancellationToken {
    let token = CancellationToken::new();
    token.cancel();
    token
}

#[test]
fn test_solves_near_complete_board() {
    let puzzle = generate(21);
    let payload = puzzle.near_complete(8);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap();

    let report = solve(&mut solver);
    let SolveOutcome::Solved { board } = report.outcome else {
        panic!("expected a solution");
    };
    let placements = codec::decode(&board).unwrap();
    let solved = Board::from_placements(&puzzle.tiles, &placements).unwrap();
    assert!(solved.is_full());
    assert_eq!(report.best_depth, CELL_COUNT);
    assert!(report.best_board.is_none());
    assert!(report.fingerprint.nodes_visited >= 8);
}

#[test]
fn test_solves_board_with_scattered_holes() {
    let puzzle = generate(22);
    let payload = puzzle.payload_without(&[3, 40, 77, 130, 201]);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap();

    let report = solve(&mut solver);
    assert_eq!(report.outcome.name(), "solved");
}

#[test]
fn test_full_board_is_solved_immediately() {
    let puzzle = generate(23);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &puzzle.full_payload()).unwrap();

    let report = solve(&mut solver);
    assert_eq!(
        report.outcome,
        SolveOutcome::Solved {
            board: puzzle.full_payload()
        }
    );
    assert_eq!(report.fingerprint.nodes_visited, 0);
}

#[test]
fn test_invalid_payload_rejected() {
    let puzzle = generate(24);
    assert!(Solver::new(Arc::clone(&puzzle.tiles), &[1, 2, 3]).is_err());
}

#[test]
fn test_unsolvable_board_exhausts() {
    let puzzle = generate_unsolvable(25);
    let payload = puzzle.near_complete(6);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap();

    let report = solve(&mut solver);
    assert_eq!(report.outcome, SolveOutcome::Exhausted);
    assert!(report.fingerprint.nodes_visited > 0);
    assert_ne!(report.fingerprint, Fingerprint::default());
}

#[test]
fn test_exhausted_fingerprints_agree() {
    let puzzle = generate_unsolvable(26);
    let payload = puzzle.near_complete(7);

    let mut first = Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap();
    let mut second = Solver::new(Arc::clone(&puzzle.tiles), &payload)
        .unwrap()
        .with_checkpoint_interval(3);

    let a = solve(&mut first);
    let b = solve(&mut second);
    assert_eq!(a.outcome, SolveOutcome::Exhausted);
    assert_eq!(b.outcome, SolveOutcome::Exhausted);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.best_depth, b.best_depth);
}

#[test]
fn test_different_boards_give_different_fingerprints() {
    let puzzle = generate_unsolvable(27);
    let mut six = Solver::new(Arc::clone(&puzzle.tiles), &puzzle.near_complete(6)).unwrap();
    let mut nine = Solver::new(Arc::clone(&puzzle.tiles), &puzzle.near_complete(9)).unwrap();

    let a = solve(&mut six);
    let b = solve(&mut nine);
    assert_ne!(a.fingerprint, b.fingerprint);
}

#[test]
fn test_best_depth_reports_deepest_board() {
    let puzzle = generate_unsolvable(28);
    let payload = puzzle.near_complete(6);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap();

    let report = solve(&mut solver);
    assert!(report.best_depth > CELL_COUNT - 6);
    assert!(report.best_depth < CELL_COUNT);
    let best = report.best_board.expect("deeper than the starting board");
    let placements = codec::decode(&best).unwrap();
    assert_eq!(placements.len(), report.best_depth);
    Board::from_placements(&puzzle.tiles, &placements).unwrap();
}

#[test]
fn test_cancelled_at_start_splits_first_cell() {
    let puzzle = generate(29);
    let payload = puzzle.near_complete(8);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload)
        .unwrap()
        .with_checkpoint_interval(1);

    let report = solver.solve(&cancelled());
    let SolveOutcome::Split { children } = report.outcome else {
        panic!("expected a split");
    };
    assert!(!children.is_empty());
    assert_eq!(report.fingerprint.nodes_visited, 1);

    let first_open = (CELL_COUNT - 8) as u8;
    for child in &children {
        let placements = codec::decode(child).unwrap();
        assert_eq!(placements.len(), CELL_COUNT - 7);
        assert!(placements.iter().any(|p| p.position == first_open));
        Board::from_placements(&puzzle.tiles, &placements).unwrap();
    }
    // the starting board is restored
    assert_eq!(solver.board().occupied_count(), CELL_COUNT - 8);
}

#[test]
fn test_split_children_keep_the_solution() {
    let puzzle = generate(30);
    let payload = puzzle.near_complete(8);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload)
        .unwrap()
        .with_checkpoint_interval(4);

    let report = solver.solve(&cancelled());
    let SolveOutcome::Split { children } = report.outcome else {
        panic!("expected a split");
    };
    assert_eq!(report.fingerprint.nodes_visited, 4);

    let solved = children
        .iter()
        .filter(|child| {
            let mut solver = Solver::new(Arc::clone(&puzzle.tiles), child).unwrap();
            solve(&mut solver).outcome.name() == "solved"
        })
        .count();
    assert!(solved >= 1);
}

#[test]
fn test_split_children_are_distinct() {
    let puzzle = generate_branching_unsolvable(41);
    let payload = puzzle.near_complete(14);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload)
        .unwrap()
        .with_checkpoint_interval(17);

    let report = solver.solve(&cancelled());
    let SolveOutcome::Split { children } = report.outcome else {
        panic!("expected a split");
    };
    assert!(children.len() > 1);

    let mut sorted = children.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), children.len());
    for child in &children {
        let mut solver = Solver::new(Arc::clone(&puzzle.tiles), child).unwrap();
        assert_eq!(solve(&mut solver).outcome, SolveOutcome::Exhausted);
    }
}

#[test]
fn test_uncancelled_token_never_splits() {
    let puzzle = generate_unsolvable(32);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &puzzle.near_complete(6))
        .unwrap()
        .with_checkpoint_interval(1);

    let report = solve(&mut solver);
    assert_eq!(report.outcome, SolveOutcome::Exhausted);
}

// =============================================================================
// Branching searches
// =============================================================================

const BRANCHING_OPEN: usize = 14;

#[test]
fn test_branching_board_backtracks_to_solution() {
    let puzzle = generate_branching(41);
    let payload = puzzle.near_complete(BRANCHING_OPEN);
    let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap();

    let report = solve(&mut solver);
    let SolveOutcome::Solved { board } = report.outcome else {
        panic!("expected a solution");
    };
    let placements = codec::decode(&board).unwrap();
    assert!(Board::from_placements(&puzzle.tiles, &placements)
        .unwrap()
        .is_full());
    // more nodes than open cells means wrong turns were undone
    assert!(report.fingerprint.nodes_visited > BRANCHING_OPEN as u64);
}

#[test]
fn test_branching_fingerprints_agree_across_intervals() {
    let puzzle = generate_branching_unsolvable(41);
    let payload = puzzle.near_complete(BRANCHING_OPEN);
    let baseline = solve(&mut Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap());
    assert_eq!(baseline.outcome, SolveOutcome::Exhausted);
    assert!(baseline.fingerprint.nodes_visited > 2 * BRANCHING_OPEN as u64);

    for interval in [1, 2, 3, 7, 17, 64] {
        let mut solver = Solver::new(Arc::clone(&puzzle.tiles), &payload)
            .unwrap()
            .with_checkpoint_interval(interval);
        let report = solve(&mut solver);
        assert_eq!(report.outcome, SolveOutcome::Exhausted);
        assert_eq!(report.fingerprint, baseline.fingerprint, "interval {}", interval);
        assert_eq!(report.best_depth, baseline.best_depth);
    }
}

#[test]
fn test_split_accounts_for_every_node() {
    let puzzle = generate_branching_unsolvable(41);
    let payload = puzzle.near_complete(BRANCHING_OPEN);
    let total = solve(&mut Solver::new(Arc::clone(&puzzle.tiles), &payload).unwrap())
        .fingerprint
        .nodes_visited;

    let mut most_children = 0;
    for interval in [1, 2, 5, 9, 17, 23] {
        assert!(interval < total);
        let mut parent = Solver::new(Arc::clone(&puzzle.tiles), &payload)
            .unwrap()
            .with_checkpoint_interval(interval);
        let report = parent.solve(&cancelled());
        assert_eq!(report.fingerprint.nodes_visited, interval);
        let SolveOutcome::Split { children } = report.outcome else {
            panic!("expected a split at interval {}", interval);
        };
        most_children = most_children.max(children.len());

        let below: u64 = children
            .iter()
            .map(|child| {
                let mut solver = Solver::new(Arc::clone(&puzzle.tiles), child).unwrap();
                let report = solve(&mut solver);
                assert_eq!(report.outcome, SolveOutcome::Exhausted);
                report.fingerprint.nodes_visited
            })
            .sum();
        assert_eq!(interval + below, total, "interval {}", interval);
        // the parent's board comes back untouched
        assert_eq!(parent.board().occupied_count(), CELL_COUNT - BRANCHING_OPEN);
    }
    assert!(most_children > 1);
}
