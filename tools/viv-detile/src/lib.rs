//! Reordering of Vivante tiled pixel data into linear scanlines.
//!
//! The GPU renders into 4x4 pixel tiles laid out row-major.  Multi-pipe
//! parts additionally interleave the output of their two pixel pipes
//! ("supertiled"): tiles alternate between the pipes in pairs, and each pipe
//! writes its share into its own half of the buffer.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Tile edge in pixels; tiles are square.
pub const TILE: usize = 4;

#[derive(Debug, Error)]
pub enum DetileError {
    #[error("image dimensions {width}x{height} are not positive multiples of {need_w}x{need_h}")]
    BadDimensions {
        width: usize,
        height: usize,
        need_w: usize,
        need_h: usize,
    },

    #[error("{side} buffer too small: need {need} bytes, got {got}")]
    BufferTooSmall {
        side: &'static str,
        need: usize,
        got: usize,
    },
}

fn check_sizes(
    dst: &[u8],
    src: &[u8],
    unit_size: usize,
    width: usize,
    height: usize,
    need_w: usize,
    need_h: usize,
) -> Result<usize, DetileError> {
    debug_assert!(unit_size > 0);
    if width == 0 || height == 0 || width % need_w != 0 || height % need_h != 0 {
        return Err(DetileError::BadDimensions {
            width,
            height,
            need_w,
            need_h,
        });
    }
    let need = width * height * unit_size;
    if src.len() < need {
        return Err(DetileError::BufferTooSmall {
            side: "source",
            need,
            got: src.len(),
        });
    }
    if dst.len() < need {
        return Err(DetileError::BufferTooSmall {
            side: "destination",
            need,
            got: dst.len(),
        });
    }
    Ok(need)
}

/// Reorders a plain 4x4-tiled image into linear scanline order.
///
/// `unit_size` is the pixel size in bytes.  Both dimensions must be
/// multiples of the tile edge.
pub fn detile(
    dst: &mut [u8],
    src: &[u8],
    unit_size: usize,
    width: usize,
    height: usize,
) -> Result<(), DetileError> {
    check_sizes(dst, src, unit_size, width, height, TILE, TILE)?;
    detile_blocks(dst, src, unit_size, width / TILE, height / TILE);
    Ok(())
}

/// Reorders a supertiled image into linear scanline order.
///
/// The pipe interleave moves tiles in groups of four across and two tile
/// rows down, so the width must be a multiple of 16 pixels and the height a
/// multiple of 8.
pub fn demultitile(
    dst: &mut [u8],
    src: &[u8],
    unit_size: usize,
    width: usize,
    height: usize,
) -> Result<(), DetileError> {
    let need = check_sizes(dst, src, unit_size, width, height, 4 * TILE, 2 * TILE)?;

    let tile_bytes = unit_size * TILE * TILE;
    let tiles_x = width / TILE;
    let tiles_y = height / TILE;
    let tile_stride = tile_bytes * tiles_x;
    let group = 4 * tile_bytes;
    let half = 2 * tile_bytes;

    // Pipe 0's tiles live in the upper half of the buffer, pipe 1's in the
    // lower half.  Regroup them into a plainly tiled image first.
    let (upper, lower) = src[..need].split_at(need / 2);
    let mut tiled = vec![0u8; need];
    for ty in 0..tiles_y / 2 {
        let dst_u = ty * 2 * tile_stride;
        let dst_l = dst_u + tile_stride;
        let src_row = ty * tile_stride;
        for tx in 0..tiles_x / 4 {
            let du = dst_u + tx * group;
            let dl = dst_l + tx * group;
            let su = src_row + tx * group;

            tiled[du..du + half].copy_from_slice(&upper[su..su + half]);
            tiled[du + half..du + group].copy_from_slice(&lower[su..su + half]);
            tiled[dl..dl + half].copy_from_slice(&lower[su + half..su + group]);
            tiled[dl + half..dl + group].copy_from_slice(&upper[su + half..su + group]);
        }
    }

    detile_blocks(dst, &tiled, unit_size, tiles_x, tiles_y);
    Ok(())
}

/// Moves whole tile rows; one tile row is contiguous in both layouts.
fn detile_blocks(dst: &mut [u8], src: &[u8], unit_size: usize, tiles_x: usize, tiles_y: usize) {
    let tile_units = TILE * TILE;
    let tile_row_units = tile_units * tiles_x;
    let row_bytes = TILE * unit_size;

    for major_y in 0..tiles_y {
        for minor_y in 0..TILE {
            let dst_y = major_y * TILE + minor_y;
            for major_x in 0..tiles_x {
                let src_unit = major_y * tile_row_units + major_x * tile_units + minor_y * TILE;
                let dst_unit = dst_y * TILE * tiles_x + major_x * TILE;
                let src_byte = src_unit * unit_size;
                let dst_byte = dst_unit * unit_size;
                dst[dst_byte..dst_byte + row_bytes]
                    .copy_from_slice(&src[src_byte..src_byte + row_bytes]);
            }
        }
    }
}
