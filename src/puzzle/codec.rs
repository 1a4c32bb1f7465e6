//! Binary placement encoding.
//!
//! A board travels as a flat run of 4-byte records, one per occupied cell:
//! little-endian `u16` tile id, `u8` row-major position, `u8` rotation.
//! There is no header, count or padding.

use thiserror::Error;

use crate::puzzle::{Board, CELL_COUNT, MAX_TILE_ID};

/// Size of one encoded placement.
pub const RECORD_LEN: usize = 4;

/// Largest encoded board.
pub const MAX_PAYLOAD_LEN: usize = RECORD_LEN * CELL_COUNT;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload length {0} is not a multiple of {RECORD_LEN}")]
    Truncated(usize),

    #[error("payload length {0} exceeds {MAX_PAYLOAD_LEN} bytes")]
    TooLong(usize),

    #[error("tile id {0} outside 1..={MAX_TILE_ID}")]
    TileId(u16),

    #[error("rotation {0} outside 0..=3")]
    Rotation(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PiecePlacement {
    pub tile_id: u16,
    pub position: u8,
    pub rotation: u8,
}

impl PiecePlacement {
    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tile_id.to_le_bytes());
        out.push(self.position);
        out.push(self.rotation);
    }
}

pub fn encode_placements(placements: &[PiecePlacement]) -> Vec<u8> {
    let mut out = Vec::with_capacity(placements.len() * RECORD_LEN);
    for p in placements {
        p.write_to(&mut out);
    }
    out
}

/// Encode every occupied cell of `board`.
pub fn encode_board(board: &Board) -> Vec<u8> {
    encode_placements(&board.placements())
}

pub fn decode(data: &[u8]) -> Result<Vec<PiecePlacement>, CodecError> {
    if data.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::TooLong(data.len()));
    }
    if data.len() % RECORD_LEN != 0 {
        return Err(CodecError::Truncated(data.len()));
    }

    data.chunks_exact(RECORD_LEN)
        .map(|rec| {
            let tile_id = u16::from_le_bytes([rec[0], rec[1]]);
            if tile_id == 0 || tile_id > MAX_TILE_ID {
                return Err(CodecError::TileId(tile_id));
            }
            if rec[3] > 3 {
                return Err(CodecError::Rotation(rec[3]));
            }
            Ok(PiecePlacement {
                tile_id,
                position: rec[2],
                rotation: rec[3],
            })
        })
        .collect()
}
