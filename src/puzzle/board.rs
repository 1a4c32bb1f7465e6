use crate::error::{EternityError, Result};
use crate::puzzle::codec::PiecePlacement;
use crate::puzzle::tile::{Tile, TileSet, BOTTOM, LEFT, RIGHT, TOP};
use crate::puzzle::{cell_of, position_of, BOARD_SIZE, BORDER_COLOR, CELL_COUNT, MAX_TILE_ID};

/// Edge cache marker for an empty cell.
const NO_EDGE: u8 = u8::MAX;

/// A placed tile: id and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub tile_id: u16,
    pub rotation: u8,
}

/// The 16x16 grid with a redundant per-cell edge cache.
///
/// The cache holds the rotated edge colors of each occupied cell so an
/// adjacency check is four array reads. Empty cells hold [`NO_EDGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Cell>; CELL_COUNT],
    edges: [[u8; 4]; CELL_COUNT],
    occupied: usize,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [None; CELL_COUNT],
            edges: [[NO_EDGE; 4]; CELL_COUNT],
            occupied: 0,
        }
    }

    /// Replay placements onto an empty board.
    ///
    /// Every placement must reference a known tile not used elsewhere, land
    /// on an empty cell and satisfy the adjacency rules against what is already placed.
    pub fn from_placements(tiles: &TileSet, placements: &[PiecePlacement]) -> Result<Self> {
        let mut board = Self::new();
        let mut seen = [false; MAX_TILE_ID as usize + 1];
        for p in placements {
            if std::mem::replace(&mut seen[p.tile_id as usize], true) {
                return Err(EternityError::InvalidBoard(format!(
                    "tile {} placed twice",
                    p.tile_id
                )));
            }
            let tile = tiles.get(p.tile_id, p.rotation).ok_or_else(|| {
                EternityError::InvalidBoard(format!("unknown tile id {}", p.tile_id))
            })?;
            let (row, col) = cell_of(p.position as usize);
            if !board.try_place(row, col, tile, p.rotation) {
                return Err(EternityError::InvalidBoard(format!(
                    "tile {} rotation {} does not fit at [{},{}]",
                    p.tile_id, p.rotation, row, col
                )));
            }
        }
        Ok(board)
    }

    /// Placements for every occupied cell in row-major order.
    pub fn placements(&self) -> Vec<PiecePlacement> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(pos, cell)| {
                cell.map(|c| PiecePlacement {
                    tile_id: c.tile_id,
                    position: pos as u8,
                    rotation: c.rotation,
                })
            })
            .collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells[position_of(row, col)]
    }

    pub fn tile_id(&self, row: usize, col: usize) -> Option<u16> {
        self.cell(row, col).map(|c| c.tile_id)
    }

    pub fn is_occupied(&self, position: usize) -> bool {
        self.cells[position].is_some()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.occupied == CELL_COUNT
    }

    /// Row-major first unoccupied cell, or `None` when the board is full.
    pub fn first_empty_cell(&self) -> Option<(usize, usize)> {
        self.cells.iter().position(Option::is_none).map(cell_of)
    }

    /// First unoccupied position strictly after `position`.
    pub fn next_empty_after(&self, position: usize) -> Option<usize> {
        (position + 1..CELL_COUNT).find(|&p| self.cells[p].is_none())
    }

    /// Whether `tile` (already rotated) may go at `(row, col)`.
    ///
    /// Pure function of the current board: border-facing edges must carry the
    /// border color and no other edge may, and every edge facing an occupied
    /// neighbor must match that neighbor's facing edge.
    pub fn is_valid_placement(&self, row: usize, col: usize, tile: &Tile) -> bool {
        let last = BOARD_SIZE - 1;
        let on_border = [row == 0, col == last, row == last, col == 0];
        for (d, &border) in on_border.iter().enumerate() {
            if border != (tile.edges[d] == BORDER_COLOR) {
                return false;
            }
        }

        if row > 0 && !self.matches(position_of(row - 1, col), BOTTOM, tile.edges[TOP]) {
            return false;
        }
        if col > 0 && !self.matches(position_of(row, col - 1), RIGHT, tile.edges[LEFT]) {
            return false;
        }
        if row < last && !self.matches(position_of(row + 1, col), TOP, tile.edges[BOTTOM]) {
            return false;
        }
        if col < last && !self.matches(position_of(row, col + 1), LEFT, tile.edges[RIGHT]) {
            return false;
        }
        true
    }

    fn matches(&self, neighbor: usize, facing: usize, color: u8) -> bool {
        let edge = self.edges[neighbor][facing];
        edge == NO_EDGE || edge == color
    }

    /// Place `tile` (already rotated by `rotation`) if the cell is empty and
    /// the placement is legal. Failure is an ordinary outcome.
    pub fn try_place(&mut self, row: usize, col: usize, tile: &Tile, rotation: u8) -> bool {
        let pos = position_of(row, col);
        if self.cells[pos].is_some() || !self.is_valid_placement(row, col, tile) {
            return false;
        }
        self.cells[pos] = Some(Cell {
            tile_id: tile.id,
            rotation: rotation & 3,
        });
        self.edges[pos] = tile.edges;
        self.occupied += 1;
        true
    }

    /// Clear a cell unconditionally.
    pub fn remove(&mut self, row: usize, col: usize) {
        let pos = position_of(row, col);
        if self.cells[pos].take().is_some() {
            self.occupied -= 1;
        }
        self.edges[pos] = [NO_EDGE; 4];
    }
}
