use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EternityError, Result};
use crate::puzzle::MAX_TILE_ID;

/// Edge index order used everywhere: top, right, bottom, left.
pub const TOP: usize = 0;
pub const RIGHT: usize = 1;
pub const BOTTOM: usize = 2;
pub const LEFT: usize = 3;

/// A puzzle tile in a fixed orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub id: u16,
    /// Edge colors as `[top, right, bottom, left]`.
    pub edges: [u8; 4],
}

impl Tile {
    pub fn new(id: u16, top: u8, right: u8, bottom: u8, left: u8) -> Self {
        Self {
            id,
            edges: [top, right, bottom, left],
        }
    }

    pub fn top(&self) -> u8 {
        self.edges[TOP]
    }

    pub fn right(&self) -> u8 {
        self.edges[RIGHT]
    }

    pub fn bottom(&self) -> u8 {
        self.edges[BOTTOM]
    }

    pub fn left(&self) -> u8 {
        self.edges[LEFT]
    }

    /// The tile turned `quarter_turns` times clockwise. Negative and
    /// oversized counts wrap modulo four.
    pub fn rotate(&self, quarter_turns: i32) -> Self {
        let k = quarter_turns.rem_euclid(4) as usize;
        let mut edges = [0u8; 4];
        for (d, edge) in edges.iter_mut().enumerate() {
            *edge = self.edges[(d + 4 - k) % 4];
        }
        Self { id: self.id, edges }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}[T:{}, R:{}, B:{}, L:{}]",
            self.id,
            self.top(),
            self.right(),
            self.bottom(),
            self.left()
        )
    }
}

/// The master tile set with every rotation precomputed.
///
/// Tiles keep the order they were supplied in; the solver iterates them in
/// that order, which makes node counts reproducible across workers that
/// loaded the same definition file.
#[derive(Debug, Clone)]
pub struct TileSet {
    tiles: Vec<Tile>,
    rotations: Vec<[Tile; 4]>,
    index_by_id: HashMap<u16, usize>,
}

impl TileSet {
    pub fn new(tiles: Vec<Tile>) -> Result<Self> {
        let mut index_by_id = HashMap::with_capacity(tiles.len());
        for (idx, tile) in tiles.iter().enumerate() {
            if tile.id == 0 || tile.id > MAX_TILE_ID {
                return Err(EternityError::InvalidBoard(format!(
                    "tile id {} outside 1..={}",
                    tile.id, MAX_TILE_ID
                )));
            }
            if index_by_id.insert(tile.id, idx).is_some() {
                return Err(EternityError::InvalidBoard(format!(
                    "duplicate tile id {}",
                    tile.id
                )));
            }
        }

        let rotations = tiles
            .iter()
            .map(|t| [t.rotate(0), t.rotate(1), t.rotate(2), t.rotate(3)])
            .collect();

        Ok(Self {
            tiles,
            rotations,
            index_by_id,
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Index of a tile id in iteration order.
    pub fn index_of(&self, id: u16) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    /// Tile at `index` turned to `rotation`.
    pub fn rotated(&self, index: usize, rotation: u8) -> &Tile {
        &self.rotations[index][(rotation & 3) as usize]
    }

    /// Tile with `id` turned to `rotation`.
    pub fn get(&self, id: u16, rotation: u8) -> Option<&Tile> {
        self.index_of(id).map(|idx| self.rotated(idx, rotation))
    }
}
