//! ETC1 / ETC1A4 block codec.
//!
//! CTR format codes 12 and 13. Texels are compressed in 4×4 blocks of
//! 8 bytes (ETC1) or 16 bytes (ETC1A4: a `u64` of 4-bit alphas followed
//! by the ETC1 color block). The GPU stores each `u64` little-endian,
//! i.e. byte-swapped relative to the big-endian bit diagram in the ETC1
//! specification; this module works on `u64` values read LE, so all bit
//! positions below match the specification directly.
//!
//! ## Color block (bits 63..0)
//! ```text
//! [63:40] base colors     individual: R1 R2 G1 G2 B1 B2 as 4-bit values
//!                         differential: 5-bit base + 3-bit signed delta
//! [39:37] codeword 1      modifier-table row for subblock 1
//! [36:34] codeword 2      modifier-table row for subblock 2
//! [33]    diff bit
//! [32]    flip bit        0 = 2×4 subblocks (left/right), 1 = 4×2
//! [31:16] index MSBs      one bit per texel, texel i at bit 16+i
//! [15:0]  index LSBs      texel i at bit i
//! ```
//! Texels are column-major within the block: `i = x * 4 + y`. The LSB
//! picks the small/large table magnitude, the MSB negates it.
//!
//! The encoder (write path) always emits individual mode with flip = 0
//! and picks, per subblock, the 4-bit-quantized channel mean as base
//! color and the codeword/index combination with least summed absolute
//! error. Deterministic, but lossy for arbitrary input.

use crate::{Error, Result};

/// Modifier magnitudes per codeword row: `[small, large]`.
const MODIFIERS: [[i32; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

/// Block byte size for the given alpha mode.
#[inline]
pub(crate) fn block_size(with_alpha: bool) -> usize {
    if with_alpha { 16 } else { 8 }
}

#[inline]
fn clamp8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[inline]
fn expand4(v: u32) -> i32 {
    ((v << 4) | v) as i32
}

#[inline]
fn expand5(v: u32) -> i32 {
    ((v << 3) | (v >> 2)) as i32
}

/// Decode one color block into 16 RGB texels, indexed `x * 4 + y`.
fn decode_block(bits: u64, rgb: &mut [[u8; 3]; 16]) {
    let diff = bits >> 33 & 1 == 1;
    let flip = bits >> 32 & 1 == 1;

    let mut base = [[0i32; 3]; 2];
    if diff {
        for c in 0..3 {
            let b1 = ((bits >> (59 - 8 * c)) & 0x1f) as u32;
            let mut delta = ((bits >> (56 - 8 * c)) & 0x07) as i32;
            if delta >= 4 {
                delta -= 8;
            }
            let b2 = (b1 as i32 + delta) as u32;
            base[0][c] = expand5(b1);
            base[1][c] = expand5(b2);
        }
    } else {
        for c in 0..3 {
            base[0][c] = expand4(((bits >> (60 - 8 * c)) & 0x0f) as u32);
            base[1][c] = expand4(((bits >> (56 - 8 * c)) & 0x0f) as u32);
        }
    }

    let cw = [(bits >> 37 & 0x07) as usize, (bits >> 34 & 0x07) as usize];
    for i in 0..16 {
        let (x, y) = (i / 4, i % 4);
        let sub = if flip { (y >= 2) as usize } else { (x >= 2) as usize };
        let lsb = (bits >> i & 1) as usize;
        let msb = bits >> (16 + i) & 1 == 1;
        let mut m = MODIFIERS[cw[sub]][lsb];
        if msb {
            m = -m;
        }
        for c in 0..3 {
            rgb[i][c] = clamp8(base[sub][c] + m);
        }
    }
}

/// Encode 16 RGB texels (indexed `x * 4 + y`) into one color block.
fn encode_block(rgb: &[[u8; 3]; 16]) -> u64 {
    let mut bits: u64 = 0; // diff = 0, flip = 0

    for sub in 0..2 {
        let texels: Vec<usize> = (0..16).filter(|i| (i / 4 >= 2) as usize == sub).collect();

        // Base color: 4-bit-quantized channel mean.
        let mut base4 = [0u32; 3];
        let mut base8 = [0i32; 3];
        for c in 0..3 {
            let sum: u32 = texels.iter().map(|&i| rgb[i][c] as u32).sum();
            base4[c] = (sum / texels.len() as u32) >> 4;
            base8[c] = expand4(base4[c]);
        }

        // Best codeword row plus per-texel index under absolute RGB error.
        let mut best = (u32::MAX, 0usize, [0u8; 8]);
        for (row, mags) in MODIFIERS.iter().enumerate() {
            let mut err = 0u32;
            let mut idx = [0u8; 8];
            for (k, &i) in texels.iter().enumerate() {
                let mut texel_best = (u32::MAX, 0u8);
                for code in 0..4u8 {
                    let mut m = mags[(code & 1) as usize];
                    if code & 2 != 0 {
                        m = -m;
                    }
                    let e: u32 = (0..3)
                        .map(|c| (clamp8(base8[c] + m) as i32 - rgb[i][c] as i32).unsigned_abs())
                        .sum();
                    if e < texel_best.0 {
                        texel_best = (e, code);
                    }
                }
                err += texel_best.0;
                idx[k] = texel_best.1;
            }
            if err < best.0 {
                best = (err, row, idx);
            }
        }

        for c in 0..3 {
            bits |= (base4[c] as u64) << (60 - 8 * c - 4 * sub);
        }
        bits |= (best.1 as u64) << (37 - 3 * sub);
        for (k, &i) in texels.iter().enumerate() {
            let code = best.2[k] as u64;
            bits |= (code & 1) << i;
            bits |= (code >> 1) << (16 + i);
        }
    }
    bits
}

/// Decode linear-ordered blocks into a row-major RGBA8888 image.
///
/// `blocks` covers a `blocks_w` × `blocks_h` grid (already de-tiled);
/// the output is cropped to `width` × `height`.
pub(crate) fn decode(
    blocks: &[u8],
    blocks_w: usize,
    blocks_h: usize,
    width: usize,
    height: usize,
    with_alpha: bool,
) -> Result<Vec<u8>> {
    let bs = block_size(with_alpha);
    if blocks.len() < blocks_w * blocks_h * bs {
        return Err(Error::TruncatedData);
    }

    let mut rgba = vec![0u8; width * height * 4];
    let mut rgb = [[0u8; 3]; 16];
    for by in 0..blocks_h {
        for bx in 0..blocks_w {
            let block = &blocks[(by * blocks_w + bx) * bs..][..bs];
            let (alpha, color) = if with_alpha {
                (
                    u64::from_le_bytes(block[..8].try_into().unwrap()),
                    u64::from_le_bytes(block[8..].try_into().unwrap()),
                )
            } else {
                (!0u64, u64::from_le_bytes(block.try_into().unwrap()))
            };
            decode_block(color, &mut rgb);
            for i in 0..16 {
                let (x, y) = (bx * 4 + i / 4, by * 4 + i % 4);
                if x >= width || y >= height {
                    continue;
                }
                let a = if with_alpha {
                    let n = (alpha >> (4 * i) & 0x0f) as u8;
                    n << 4 | n
                } else {
                    0xff
                };
                let dst = (y * width + x) * 4;
                rgba[dst..dst + 3].copy_from_slice(&rgb[i]);
                rgba[dst + 3] = a;
            }
        }
    }
    Ok(rgba)
}

/// Encode a row-major RGBA8888 image into linear-ordered blocks covering
/// a `blocks_w` × `blocks_h` grid. Texels outside the image are black.
pub(crate) fn encode(
    rgba: &[u8],
    width: usize,
    height: usize,
    blocks_w: usize,
    blocks_h: usize,
    with_alpha: bool,
) -> Vec<u8> {
    let bs = block_size(with_alpha);
    let mut blocks = vec![0u8; blocks_w * blocks_h * bs];
    let mut rgb = [[0u8; 3]; 16];
    for by in 0..blocks_h {
        for bx in 0..blocks_w {
            let mut alpha: u64 = 0;
            for i in 0..16 {
                let (x, y) = (bx * 4 + i / 4, by * 4 + i % 4);
                if x >= width || y >= height {
                    rgb[i] = [0; 3];
                    continue;
                }
                let src = (y * width + x) * 4;
                rgb[i].copy_from_slice(&rgba[src..src + 3]);
                alpha |= ((rgba[src + 3] >> 4) as u64) << (4 * i);
            }
            let color = encode_block(&rgb);
            let dst = &mut blocks[(by * blocks_w + bx) * bs..][..bs];
            if with_alpha {
                dst[..8].copy_from_slice(&alpha.to_le_bytes());
                dst[8..].copy_from_slice(&color.to_le_bytes());
            } else {
                dst.copy_from_slice(&color.to_le_bytes());
            }
        }
    }
    blocks
}
