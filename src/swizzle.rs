//! CTR texture tiling ("swizzle") transform.
//!
//! The 3DS GPU does not store texels row-major. Pixels are grouped into
//! 8×8 tiles, tiles are laid out row-major over the (tile-padded) image,
//! and within a tile pixels follow a Morton order: the storage index
//! interleaves the coordinate bits, with `x` contributing the even bits
//! starting at bit 0.
//!
//! ```text
//! index  =  y2 x2 y1 x1 y0 x0      (8×8 tile, bit 5 .. bit 0)
//! ```
//!
//! Images smaller than a full tile store only the Morton prefix their
//! pixels occupy: a 4×4 image uses indices 0..16 of the 8×8 order, which
//! is exactly the 4×4 Morton order. The transform therefore works with an
//! *effective* tile dimension - the largest power of two that fits both
//! axes, capped at 8 - so a 4×4 RGB565 image occupies exactly 32 bytes,
//! matching the sizes the container formats record.
//!
//! Block-compressed formats use the very same transform at block
//! granularity: 4×4 ETC1 blocks form 2×2 groups per 8×8-pixel tile, so
//! the unit becomes one block and the tile cap drops to 2.
//!
//! Dimensions that are not multiples of the effective tile are padded to
//! the next tile boundary in storage. The padding never leaks: [`detile`]
//! returns exactly `width * height * bpp` linear bytes, and [`tile`]
//! accepts exactly that many, zero-filling any padding it emits.

use crate::{Error, Result};

/// Tile dimension cap for per-pixel formats.
pub const TILE_DIM: usize = 8;

/// Round `n` up to the next multiple of `tile_dim`.
#[inline]
pub(crate) fn pad_dim(n: usize, tile_dim: usize) -> usize {
    n.div_ceil(tile_dim) * tile_dim
}

/// Effective tile dimension for a `w` × `h` unit grid: the largest power
/// of two not exceeding either axis, capped at `max_tile`.
#[inline]
pub(crate) fn effective_tile(w: usize, h: usize, max_tile: usize) -> usize {
    let m = w.min(h).min(max_tile);
    if m == 0 {
        1
    } else {
        // Largest power of two <= m.
        1 << (usize::BITS - 1 - m.leading_zeros())
    }
}

/// Storage unit count of a `units_w` × `units_h` grid padded to its
/// effective tile boundary.
#[inline]
pub(crate) fn padded_units(units_w: usize, units_h: usize, max_tile: usize) -> usize {
    let td = effective_tile(units_w, units_h, max_tile);
    pad_dim(units_w, td) * pad_dim(units_h, td)
}

/// Interleave the low bits of `x` and `y` into a Morton index within a
/// `tile_dim` × `tile_dim` tile. `x` provides bit 0.
#[inline]
fn morton(x: usize, y: usize, tile_dim: usize) -> usize {
    let bits = tile_dim.trailing_zeros();
    let mut idx = 0;
    for b in 0..bits {
        idx |= ((x >> b) & 1) << (2 * b);
        idx |= ((y >> b) & 1) << (2 * b + 1);
    }
    idx
}

/// Inverse of [`morton`]: split an in-tile index back into coordinates.
#[inline]
fn unmorton(idx: usize, tile_dim: usize) -> (usize, usize) {
    let bits = tile_dim.trailing_zeros();
    let (mut x, mut y) = (0, 0);
    for b in 0..bits {
        x |= ((idx >> (2 * b)) & 1) << b;
        y |= ((idx >> (2 * b + 1)) & 1) << b;
    }
    (x, y)
}

/// Convert tiled unit data to linear (row-major) order.
///
/// `data` must hold at least the tile-padded unit count; excess bytes are
/// ignored. The result holds exactly `units_w * units_h * unit_size`
/// bytes.
pub(crate) fn detile_units(
    data: &[u8],
    units_w: usize,
    units_h: usize,
    unit_size: usize,
    max_tile: usize,
) -> Result<Vec<u8>> {
    if data.len() < padded_units(units_w, units_h, max_tile) * unit_size {
        return Err(Error::TruncatedData);
    }
    let td = effective_tile(units_w, units_h, max_tile);
    let tiles_x = pad_dim(units_w, td) / td;
    let tiles_y = pad_dim(units_h, td) / td;
    let per_tile = td * td;

    let mut linear = vec![0u8; units_w * units_h * unit_size];
    let mut src = 0;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            for i in 0..per_tile {
                let (ix, iy) = unmorton(i, td);
                let x = tx * td + ix;
                let y = ty * td + iy;
                if x < units_w && y < units_h {
                    let dst = (y * units_w + x) * unit_size;
                    linear[dst..dst + unit_size].copy_from_slice(&data[src..src + unit_size]);
                }
                src += unit_size;
            }
        }
    }
    Ok(linear)
}

/// Convert linear unit data to tiled storage order.
///
/// `linear` must hold exactly `units_w * units_h * unit_size` bytes. The
/// result holds the tile-padded unit count, with padding units zeroed.
pub(crate) fn tile_units(
    linear: &[u8],
    units_w: usize,
    units_h: usize,
    unit_size: usize,
    max_tile: usize,
) -> Result<Vec<u8>> {
    if linear.len() != units_w * units_h * unit_size {
        return Err(Error::TruncatedData);
    }
    let td = effective_tile(units_w, units_h, max_tile);
    let tiles_x = pad_dim(units_w, td) / td;
    let tiles_y = pad_dim(units_h, td) / td;
    let per_tile = td * td;

    let mut tiled = vec![0u8; padded_units(units_w, units_h, max_tile) * unit_size];
    let mut dst = 0;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            for i in 0..per_tile {
                let (ix, iy) = unmorton(i, td);
                let x = tx * td + ix;
                let y = ty * td + iy;
                if x < units_w && y < units_h {
                    let src = (y * units_w + x) * unit_size;
                    tiled[dst..dst + unit_size].copy_from_slice(&linear[src..src + unit_size]);
                }
                dst += unit_size;
            }
        }
    }
    Ok(tiled)
}

/// De-tile a pixel image: tiled bytes → row-major bytes.
pub fn detile(tiled: &[u8], width: u32, height: u32, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    detile_units(tiled, width as usize, height as usize, bytes_per_pixel, TILE_DIM)
}

/// Tile a pixel image: row-major bytes → tiled bytes.
pub fn tile(linear: &[u8], width: u32, height: u32, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    tile_units(linear, width as usize, height as usize, bytes_per_pixel, TILE_DIM)
}
