//! Puzzle model: tiles, the board, and the placement wire format.
//!
//! The grid size and the border color are fixed to the 16x16 puzzle family.
//! Cells are addressed row-major, `position = row * BOARD_SIZE + col`, and
//! the search always fills them in that order.

pub mod board;
pub mod codec;
pub mod loader;
pub mod tile;

pub use board::Board;
pub use codec::{CodecError, PiecePlacement};
pub use loader::Hint;
pub use tile::{Tile, TileSet};

/// Width and height of the grid.
pub const BOARD_SIZE: usize = 16;

/// Number of cells on the grid.
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// Edge color reserved for the outer frame.
pub const BORDER_COLOR: u8 = 0;

/// Largest valid tile identifier.
pub const MAX_TILE_ID: u16 = CELL_COUNT as u16;

/// Row and column of a row-major position.
pub fn cell_of(position: usize) -> (usize, usize) {
    (position / BOARD_SIZE, position % BOARD_SIZE)
}

/// Row-major position of a cell.
pub fn position_of(row: usize, col: usize) -> usize {
    row * BOARD_SIZE + col
}
