//! Tile and hint definition files.
//!
//! Tiles: one `id,east,south,west,north` record per line, a blank edge
//! meaning the border color. Hints: `row,col,tile_id,rotation`, separated by
//! commas or spaces. Lines that do not parse are skipped.

use std::path::Path;

use crate::error::Result;
use crate::puzzle::tile::Tile;
use crate::puzzle::{Board, TileSet, BOARD_SIZE, BORDER_COLOR};

/// A fixed placement applied to the seed board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub row: usize,
    pub col: usize,
    pub tile_id: u16,
    pub rotation: u8,
}

pub fn parse_tiles(text: &str) -> Vec<Tile> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < 5 {
                return None;
            }
            let id: u16 = parts[0].trim().parse().ok()?;
            // Header record of some distributions: "16,16,<colors>,..."
            if id == 16 && parts[1].trim() == "16" {
                tracing::debug!(line, "Skipping tile file metadata line");
                return None;
            }
            let east = parse_edge(parts[1]);
            let south = parse_edge(parts[2]);
            let west = parse_edge(parts[3]);
            let north = parse_edge(parts[4]);
            Some(Tile::new(id, north, east, south, west))
        })
        .collect()
}

fn parse_edge(value: &str) -> u8 {
    value.trim().parse().unwrap_or(BORDER_COLOR)
}

pub fn parse_hints(text: &str) -> Vec<Hint> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line
                .split([',', ' '])
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 4 {
                return None;
            }
            let row: usize = parts[0].trim().parse().ok()?;
            let col: usize = parts[1].trim().parse().ok()?;
            let tile_id: u16 = parts[2].trim().parse().ok()?;
            let rotation: u8 = parts[3].trim().parse().ok()?;
            if row >= BOARD_SIZE || col >= BOARD_SIZE || rotation > 3 {
                tracing::warn!(line, "Hint outside the grid, skipped");
                return None;
            }
            Some(Hint {
                row,
                col,
                tile_id,
                rotation,
            })
        })
        .collect()
}

pub fn load_tiles(path: &Path) -> Result<TileSet> {
    let text = std::fs::read_to_string(path)?;
    let tiles = parse_tiles(&text);
    tracing::info!(path = %path.display(), count = tiles.len(), "Loaded tile definitions");
    TileSet::new(tiles)
}

/// Hints are optional; a missing file yields none.
pub fn load_hints(path: &Path) -> Result<Vec<Hint>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No hint file, seeding an empty board");
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(parse_hints(&text))
}

/// Build the seed board from hints. Hints naming an unknown tile or not
/// fitting the board are skipped with a warning.
pub fn seed_board(tiles: &TileSet, hints: &[Hint]) -> Board {
    let mut board = Board::new();
    for hint in hints {
        let placed = tiles
            .get(hint.tile_id, hint.rotation)
            .map(|tile| board.try_place(hint.row, hint.col, tile, hint.rotation))
            .unwrap_or(false);
        if !placed {
            tracing::warn!(
                row = hint.row,
                col = hint.col,
                tile_id = hint.tile_id,
                rotation = hint.rotation,
                "Hint rejected"
            );
        }
    }
    board
}
