
use std::io::Write;

use eternity_grid::error::EternityError;
use eternity_grid::puzzle::codec::{self, CodecError, PiecePlacement, MAX_PAYLOAD_LEN};
use eternity_grid::puzzle::loader::{self, Hint};
use eternity_grid::puzzle::{position_of, Board, Tile, TileSet, CELL_COUNT};

use test_harness::generate;

// =============================================================================
// Tiles
// =============================================================================

#[test]
fn test_rotation_moves_edges_clockwise() {
    let tile = Tile::new(7, 1, 2, 3, 4);
    let turned = tile.rotate(1);
    // old left becomes top, old top becomes right
    assert_eq!(turned.edges, [4, 1, 2, 3]);
    assert_eq!(turned.id, 7);
}

#[test]
fn test_rotation_wraps() {
    let tile = Tile::new(1, 5, 6, 7, 8);
    assert_eq!(tile.rotate(4), tile);
    assert_eq!(tile.rotate(-1), tile.rotate(3));
    assert_eq!(tile.rotate(1).rotate(1), tile.rotate(2));
    assert_eq!(tile.rotate(6), tile.rotate(2));
}

#[test]
fn test_tile_set_rejects_bad_ids() {
    let dup = vec![Tile::new(1, 0, 1, 1, 0), Tile::new(1, 0, 2, 2, 0)];
    assert!(matches!(TileSet::new(dup), Err(EternityError::InvalidBoard(_))));

    let zero = vec![Tile::new(0, 0, 1, 1, 0)];
    assert!(TileSet::new(zero).is_err());

    let too_big = vec![Tile::new(257, 0, 1, 1, 0)];
    assert!(TileSet::new(too_big).is_err());
}

#[test]
fn test_tile_set_lookup() {
    let set = TileSet::new(vec![Tile::new(9, 0, 1, 2, 0), Tile::new(3, 1, 2, 3, 4)]).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.index_of(3), Some(1));
    assert_eq!(set.get(3, 1).unwrap().edges, [4, 1, 2, 3]);
    assert!(set.get(4, 0).is_none());
}

// =============================================================================
// Board
// =============================================================================

#[test]
fn test_corner_requires_border_edges() {
    let board = Board::new();
    let corner = Tile::new(1, 0, 5, 6, 0);
    assert!(board.is_valid_placement(0, 0, &corner));
    // wrong orientation puts a border edge on the interior
    assert!(!board.is_valid_placement(0, 0, &corner.rotate(1)));
    // a corner tile has too many border edges for an interior cell
    assert!(!board.is_valid_placement(5, 5, &corner));
}

#[test]
fn test_interior_tile_rejects_border_cell() {
    let board = Board::new();
    let interior = Tile::new(2, 3, 4, 5, 6);
    assert!(board.is_valid_placement(7, 7, &interior));
    assert!(!board.is_valid_placement(0, 7, &interior));
    assert!(!board.is_valid_placement(15, 15, &interior));
}

#[test]
fn test_neighbors_must_match() {
    let mut board = Board::new();
    let corner = Tile::new(1, 0, 5, 6, 0);
    assert!(board.try_place(0, 0, &corner, 0));

    let fits = Tile::new(2, 0, 7, 8, 5);
    let clashes = Tile::new(3, 0, 7, 8, 9);
    assert!(board.is_valid_placement(0, 1, &fits));
    assert!(!board.is_valid_placement(0, 1, &clashes));

    let below_fits = Tile::new(4, 6, 1, 2, 0);
    let below_clashes = Tile::new(5, 9, 1, 2, 0);
    assert!(board.is_valid_placement(1, 0, &below_fits));
    assert!(!board.is_valid_placement(1, 0, &below_clashes));
}

#[test]
fn test_right_and_bottom_neighbors_checked() {
    let mut board = Board::new();
    // occupy (1,2) first, then test (1,1) against it from the left side
    assert!(board.try_place(1, 2, &Tile::new(1, 3, 4, 5, 6), 0));
    assert!(board.is_valid_placement(1, 1, &Tile::new(2, 1, 6, 2, 3)));
    assert!(!board.is_valid_placement(1, 1, &Tile::new(3, 1, 7, 2, 3)));
}

#[test]
fn test_validity_check_does_not_mutate() {
    let puzzle = generate(11);
    let board = puzzle.board_without(&[100, 200]);
    let before = board.clone();
    for idx in 0..puzzle.tiles.len() {
        for rot in 0..4 {
            let _ = board.is_valid_placement(6, 4, puzzle.tiles.rotated(idx, rot));
        }
    }
    assert_eq!(board, before);
}

#[test]
fn test_try_place_and_remove() {
    let mut board = Board::new();
    let corner = Tile::new(1, 0, 5, 6, 0);
    assert!(board.try_place(0, 0, &corner, 0));
    assert_eq!(board.occupied_count(), 1);
    // occupied cell refuses a second tile
    assert!(!board.try_place(0, 0, &corner, 0));
    assert_eq!(board.first_empty_cell(), Some((0, 1)));

    board.remove(0, 0);
    assert_eq!(board.occupied_count(), 0);
    assert_eq!(board.first_empty_cell(), Some((0, 0)));
    // removing an empty cell is harmless
    board.remove(0, 0);
    assert_eq!(board.occupied_count(), 0);
}

#[test]
fn test_generated_solution_replays() {
    let puzzle = generate(1);
    let board = Board::from_placements(&puzzle.tiles, &puzzle.solution).unwrap();
    assert!(board.is_full());
    assert_eq!(board.first_empty_cell(), None);
    assert_eq!(board.placements(), puzzle.solution);
}

#[test]
fn test_from_placements_rejects_misfit() {
    let puzzle = generate(2);
    let mut placements = puzzle.solution[..18].to_vec();
    // a corner tile cannot sit on an interior cell in any orientation
    let mut corner = puzzle.solution[CELL_COUNT - 1];
    corner.position = 18;
    placements.push(corner);
    assert!(matches!(
        Board::from_placements(&puzzle.tiles, &placements),
        Err(EternityError::InvalidBoard(_))
    ));
}

#[test]
fn test_from_placements_rejects_reused_tile() {
    let puzzle = generate(2);
    let mut twice = puzzle.solution[0];
    twice.position = 200;
    let placements = vec![puzzle.solution[0], twice];
    assert!(matches!(
        Board::from_placements(&puzzle.tiles, &placements),
        Err(EternityError::InvalidBoard(_))
    ));
}

#[test]
fn test_next_empty_after_skips_hints() {
    let puzzle = generate(3);
    let board = puzzle.board_without(&[10, 12, 40]);
    assert_eq!(board.first_empty_cell(), Some((0, 10)));
    assert_eq!(board.next_empty_after(10), Some(12));
    assert_eq!(board.next_empty_after(12), Some(40));
    assert_eq!(board.next_empty_after(40), None);
}

// =============================================================================
// Codec
// =============================================================================

#[test]
fn test_codec_layout() {
    let placements = [PiecePlacement {
        tile_id: 0x0100,
        position: 17,
        rotation: 3,
    }];
    let bytes = codec::encode_placements(&placements);
    assert_eq!(bytes, vec![0x00, 0x01, 17, 3]);
    assert_eq!(codec::decode(&bytes).unwrap(), placements);
}

#[test]
fn test_codec_board_round_trip() {
    let puzzle = generate(4);
    let board = puzzle.board_without(&[0, 5, 255]);
    let decoded = codec::decode(&codec::encode_board(&board)).unwrap();
    assert_eq!(decoded.len(), CELL_COUNT - 3);
    assert_eq!(Board::from_placements(&puzzle.tiles, &decoded).unwrap(), board);
}

#[test]
fn test_codec_empty_payload() {
    assert!(codec::decode(&[]).unwrap().is_empty());
}

#[test]
fn test_codec_rejects_malformed() {
    assert_eq!(codec::decode(&[1, 0, 0]), Err(CodecError::Truncated(3)));
    assert_eq!(codec::decode(&[0, 0, 0, 0]), Err(CodecError::TileId(0)));
    assert_eq!(codec::decode(&[1, 1, 0, 0]), Err(CodecError::TileId(257)));
    assert_eq!(codec::decode(&[1, 0, 0, 4]), Err(CodecError::Rotation(4)));

    let oversized = vec![1u8; MAX_PAYLOAD_LEN + 4];
    assert_eq!(
        codec::decode(&oversized),
        Err(CodecError::TooLong(MAX_PAYLOAD_LEN + 4))
    );
}

// =============================================================================
// Loader
// =============================================================================

#[test]
fn test_parse_tiles_column_order() {
    // id,east,south,west,north
    let tiles = loader::parse_tiles("1,5,6,0,0\n2,7,,5,0\n");
    assert_eq!(tiles.len(), 2);
    assert_eq!(tiles[0], Tile::new(1, 0, 5, 6, 0));
    // blank south edge is the border color
    assert_eq!(tiles[1], Tile::new(2, 0, 7, 0, 5));
}

#[test]
fn test_parse_tiles_skips_metadata_and_junk() {
    let text = "16,16,22,5,17\n\nnot,a,tile\n1,5,6,0,0\nx,1,2,3,4\n";
    let tiles = loader::parse_tiles(text);
    assert_eq!(tiles, vec![Tile::new(1, 0, 5, 6, 0)]);
}

#[test]
fn test_parse_hints_separators() {
    let hints = loader::parse_hints("7,8,139,2\n2 13 181 3\n99,0,1,0\nbad line\n");
    assert_eq!(
        hints,
        vec![
            Hint {
                row: 7,
                col: 8,
                tile_id: 139,
                rotation: 2
            },
            Hint {
                row: 2,
                col: 13,
                tile_id: 181,
                rotation: 3
            },
        ]
    );
}

#[test]
fn test_load_tiles_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "16,16,22,5,17").unwrap();
    writeln!(file, "1,5,6,0,0").unwrap();
    writeln!(file, "2,7,8,5,0").unwrap();
    file.flush().unwrap();

    let set = loader::load_tiles(file.path()).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(2, 0).unwrap().edges, [0, 7, 8, 5]);
}

#[test]
fn test_load_tiles_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = loader::load_tiles(&dir.path().join("missing.csv")).unwrap_err();
    assert!(matches!(err, EternityError::Io(_)));
}

#[test]
fn test_missing_hint_file_means_no_hints() {
    let dir = tempfile::tempdir().unwrap();
    let hints = loader::load_hints(&dir.path().join("hints.csv")).unwrap();
    assert!(hints.is_empty());
}

#[test]
fn test_seed_board_skips_rejected_hints() {
    let puzzle = generate(5);
    let good = puzzle.solution[position_of(0, 0)];
    let hints = vec![
        Hint {
            row: 0,
            col: 0,
            tile_id: good.tile_id,
            rotation: good.rotation,
        },
        // unknown tile id
        Hint {
            row: 8,
            col: 8,
            tile_id: 999,
            rotation: 0,
        },
        // interior tile on a border cell
        Hint {
            row: 0,
            col: 5,
            tile_id: puzzle.solution[position_of(8, 8)].tile_id,
            rotation: 0,
        },
    ];
    let board = loader::seed_board(&puzzle.tiles, &hints);
    assert_eq!(board.occupied_count(), 1);
    assert_eq!(board.tile_id(0, 0), Some(good.tile_id));
}
