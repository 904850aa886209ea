//! Pixel-format codec: CTR texture data ↔ RGBA8888.
//!
//! The CTR pipeline uses a fixed, exhaustively known set of pixel formats
//! identified by a small integer code. [`PixelFormat`] is the closed
//! enumeration of that table; codes outside it are rejected with
//! [`Error::UnsupportedFormat`], never approximated.
//!
//! | code | format   | bpp | stored layout (after de-tiling)            |
//! |------|----------|-----|--------------------------------------------|
//! | 0    | RGBA8888 | 32  | bytes `A B G R`                            |
//! | 1    | RGB888   | 24  | bytes `B G R`                              |
//! | 2    | RGBA5551 | 16  | u16 LE: `R5 G5 B5 A1` (R at the MSB end)   |
//! | 3    | RGB565   | 16  | u16 LE: `R5 G6 B5`                         |
//! | 4    | RGBA4444 | 16  | u16 LE: `R4 G4 B4 A4`                      |
//! | 5    | LA88     | 16  | bytes `A L`                                |
//! | 6    | HILO88   | 16  | bytes `G R` (two channels, no alpha)       |
//! | 7    | L8       | 8   | byte `L`                                   |
//! | 8    | A8       | 8   | byte `A`                                   |
//! | 9    | LA44     | 8   | byte: L high nibble, A low nibble          |
//! | 10   | L4       | 4   | two pixels per byte, first in low nibble   |
//! | 11   | A4       | 4   | same packing as L4                         |
//! | 12   | ETC1     | 4   | 8-byte 4×4 blocks ([`etc1`])               |
//! | 13   | ETC1A4   | 8   | 16-byte 4×4 blocks with 4-bit alpha        |
//!
//! [`decode`] takes raw texture bytes exactly as stored (tiled), undoes
//! the swizzle and expands to row-major RGBA8888; [`encode`] is the
//! reverse and always emits the tile-padded storage size.
//!
//! ## Channel scaling
//! Sub-8-bit channels expand by bit replication (`0b10110` → `0b10110101`)
//! and quantize by truncation (`x >> (8 - bits)`). Replication equals
//! `round(v * 255 / (2^bits - 1))` exactly for 1- and 4-bit channels and
//! is within one output step of it for 5- and 6-bit ones. The pair is a
//! retraction: `quantize(expand(v)) == v` for every stored value, so
//! decode→encode→decode is idempotent after the first quantization.

pub(crate) mod etc1;

use crate::swizzle::{self, TILE_DIM};
use crate::{Error, Result};

/// One entry of the CTR pixel-format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    Rgb888,
    Rgba5551,
    Rgb565,
    Rgba4444,
    La88,
    Hilo88,
    L8,
    A8,
    La44,
    L4,
    A4,
    Etc1,
    Etc1A4,
}

impl PixelFormat {
    /// Look up a format code in the table.
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => Self::Rgba8888,
            1 => Self::Rgb888,
            2 => Self::Rgba5551,
            3 => Self::Rgb565,
            4 => Self::Rgba4444,
            5 => Self::La88,
            6 => Self::Hilo88,
            7 => Self::L8,
            8 => Self::A8,
            9 => Self::La44,
            10 => Self::L4,
            11 => Self::A4,
            12 => Self::Etc1,
            13 => Self::Etc1A4,
            other => return Err(Error::UnsupportedFormat(other)),
        })
    }

    /// The format's code in the table.
    pub fn code(self) -> u32 {
        match self {
            Self::Rgba8888 => 0,
            Self::Rgb888 => 1,
            Self::Rgba5551 => 2,
            Self::Rgb565 => 3,
            Self::Rgba4444 => 4,
            Self::La88 => 5,
            Self::Hilo88 => 6,
            Self::L8 => 7,
            Self::A8 => 8,
            Self::La44 => 9,
            Self::L4 => 10,
            Self::A4 => 11,
            Self::Etc1 => 12,
            Self::Etc1A4 => 13,
        }
    }

    /// Storage bits per pixel.
    pub fn bits_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888 => 32,
            Self::Rgb888 => 24,
            Self::Rgba5551 | Self::Rgb565 | Self::Rgba4444 | Self::La88 | Self::Hilo88 => 16,
            Self::L8 | Self::A8 | Self::La44 | Self::Etc1A4 => 8,
            Self::L4 | Self::A4 | Self::Etc1 => 4,
        }
    }

    /// Whether the format stores 4×4 compressed blocks rather than
    /// per-pixel channel values.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Etc1 | Self::Etc1A4)
    }

    /// Exact storage byte count for a `width` × `height` image,
    /// including any tile padding.
    pub fn data_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        if self.is_compressed() {
            let (bw, bh) = block_grid(w, h);
            swizzle::padded_units(bw, bh, 2) * etc1::block_size(self == Self::Etc1A4)
        } else {
            (swizzle::padded_units(w, h, TILE_DIM) * self.bits_per_pixel()).div_ceil(8)
        }
    }
}

/// Block-grid dimensions for a compressed image: one unit per 4×4 block.
fn block_grid(w: usize, h: usize) -> (usize, usize) {
    (w.div_ceil(4), h.div_ceil(4))
}

/// Expand a `bits`-wide channel value to 8 bits by bit replication.
#[inline]
fn expand_bits(v: u8, bits: u32) -> u8 {
    match bits {
        1 => {
            if v == 0 {
                0
            } else {
                0xff
            }
        }
        4 => v << 4 | v,
        5 => v << 3 | v >> 2,
        6 => v << 2 | v >> 4,
        _ => v,
    }
}

/// Quantize an 8-bit channel value down to `bits` by truncation.
#[inline]
fn quantize_bits(v: u8, bits: u32) -> u8 {
    v >> (8 - bits)
}

/// Decode raw (tiled) texture bytes into a row-major RGBA8888 buffer.
///
/// Fails with [`Error::TruncatedData`] when `raw` is shorter than
/// [`PixelFormat::data_size`] implies.
pub fn decode(fmt: PixelFormat, raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let need = fmt.data_size(width, height);
    if raw.len() < need {
        return Err(Error::TruncatedData);
    }
    let raw = &raw[..need];
    let (w, h) = (width as usize, height as usize);

    if fmt.is_compressed() {
        let with_alpha = fmt == PixelFormat::Etc1A4;
        let (bw, bh) = block_grid(w, h);
        let blocks = swizzle::detile_units(raw, bw, bh, etc1::block_size(with_alpha), 2)?;
        return etc1::decode(&blocks, bw, bh, w, h, with_alpha);
    }

    // Nibble formats de-tile at one byte per pixel after unpacking;
    // everything else at the format's own pixel stride.
    let linear = if fmt.bits_per_pixel() == 4 {
        let unpacked: Vec<u8> = raw
            .iter()
            .flat_map(|&b| [b & 0x0f, b >> 4])
            .collect();
        swizzle::detile(&unpacked, width, height, 1)?
    } else {
        swizzle::detile(raw, width, height, fmt.bits_per_pixel() / 8)?
    };

    let mut rgba = Vec::with_capacity(w * h * 4);
    let stride = fmt.bits_per_pixel().max(8) / 8;
    for px in linear.chunks_exact(stride) {
        rgba.extend_from_slice(&decode_pixel(fmt, px));
    }
    Ok(rgba)
}

/// Encode a row-major RGBA8888 buffer into raw (tiled) texture bytes.
///
/// Always produces exactly [`PixelFormat::data_size`] bytes. Fails with
/// [`Error::TruncatedData`] when `rgba` is not `width * height * 4` bytes.
pub fn encode(fmt: PixelFormat, rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    if rgba.len() != w * h * 4 {
        return Err(Error::TruncatedData);
    }

    if fmt.is_compressed() {
        let with_alpha = fmt == PixelFormat::Etc1A4;
        let (bw, bh) = block_grid(w, h);
        let blocks = etc1::encode(rgba, w, h, bw, bh, with_alpha);
        return swizzle::tile_units(&blocks, bw, bh, etc1::block_size(with_alpha), 2);
    }

    let stride = fmt.bits_per_pixel().max(8) / 8;
    let mut linear = Vec::with_capacity(w * h * stride);
    for px in rgba.chunks_exact(4) {
        linear.extend_from_slice(&encode_pixel(fmt, px));
    }

    if fmt.bits_per_pixel() == 4 {
        let tiled = swizzle::tile(&linear, width, height, 1)?;
        Ok(tiled
            .chunks(2)
            .map(|p| p[0] & 0x0f | p.get(1).copied().unwrap_or(0) << 4)
            .collect())
    } else {
        swizzle::tile(&linear, width, height, stride)
    }
}

/// Decode one linear pixel into `[R, G, B, A]`. `px` is
/// `bits_per_pixel / 8` bytes (one byte for nibble formats, value in the
/// low nibble).
fn decode_pixel(fmt: PixelFormat, px: &[u8]) -> [u8; 4] {
    match fmt {
        PixelFormat::Rgba8888 => [px[3], px[2], px[1], px[0]],
        PixelFormat::Rgb888 => [px[2], px[1], px[0], 0xff],
        PixelFormat::Rgba5551 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            [
                expand_bits((v >> 11) as u8 & 0x1f, 5),
                expand_bits((v >> 6) as u8 & 0x1f, 5),
                expand_bits((v >> 1) as u8 & 0x1f, 5),
                expand_bits(v as u8 & 1, 1),
            ]
        }
        PixelFormat::Rgb565 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            [
                expand_bits((v >> 11) as u8 & 0x1f, 5),
                expand_bits((v >> 5) as u8 & 0x3f, 6),
                expand_bits(v as u8 & 0x1f, 5),
                0xff,
            ]
        }
        PixelFormat::Rgba4444 => {
            let v = u16::from_le_bytes([px[0], px[1]]);
            [
                expand_bits((v >> 12) as u8 & 0x0f, 4),
                expand_bits((v >> 8) as u8 & 0x0f, 4),
                expand_bits((v >> 4) as u8 & 0x0f, 4),
                expand_bits(v as u8 & 0x0f, 4),
            ]
        }
        PixelFormat::La88 => [px[1], px[1], px[1], px[0]],
        PixelFormat::Hilo88 => [px[1], px[0], 0, 0xff],
        PixelFormat::L8 => [px[0], px[0], px[0], 0xff],
        PixelFormat::A8 => [0xff, 0xff, 0xff, px[0]],
        PixelFormat::La44 => {
            let l = expand_bits(px[0] >> 4, 4);
            [l, l, l, expand_bits(px[0] & 0x0f, 4)]
        }
        PixelFormat::L4 => {
            let l = expand_bits(px[0] & 0x0f, 4);
            [l, l, l, 0xff]
        }
        PixelFormat::A4 => [0xff, 0xff, 0xff, expand_bits(px[0] & 0x0f, 4)],
        PixelFormat::Etc1 | PixelFormat::Etc1A4 => unreachable!("block formats decode per block"),
    }
}

/// Encode one `[R, G, B, A]` pixel into its linear stored bytes.
/// Luminance formats take the red channel (decode writes the same value
/// to all three).
fn encode_pixel(fmt: PixelFormat, px: &[u8]) -> Vec<u8> {
    let (r, g, b, a) = (px[0], px[1], px[2], px[3]);
    match fmt {
        PixelFormat::Rgba8888 => vec![a, b, g, r],
        PixelFormat::Rgb888 => vec![b, g, r],
        PixelFormat::Rgba5551 => {
            let v = (quantize_bits(r, 5) as u16) << 11
                | (quantize_bits(g, 5) as u16) << 6
                | (quantize_bits(b, 5) as u16) << 1
                | quantize_bits(a, 1) as u16;
            v.to_le_bytes().to_vec()
        }
        PixelFormat::Rgb565 => {
            let v = (quantize_bits(r, 5) as u16) << 11
                | (quantize_bits(g, 6) as u16) << 5
                | quantize_bits(b, 5) as u16;
            v.to_le_bytes().to_vec()
        }
        PixelFormat::Rgba4444 => {
            let v = (quantize_bits(r, 4) as u16) << 12
                | (quantize_bits(g, 4) as u16) << 8
                | (quantize_bits(b, 4) as u16) << 4
                | quantize_bits(a, 4) as u16;
            v.to_le_bytes().to_vec()
        }
        PixelFormat::La88 => vec![a, r],
        PixelFormat::Hilo88 => vec![g, r],
        PixelFormat::L8 => vec![r],
        PixelFormat::A8 => vec![a],
        PixelFormat::La44 => vec![quantize_bits(r, 4) << 4 | quantize_bits(a, 4)],
        PixelFormat::L4 => vec![quantize_bits(r, 4)],
        PixelFormat::A4 => vec![quantize_bits(a, 4)],
        PixelFormat::Etc1 | PixelFormat::Etc1A4 => unreachable!("block formats encode per block"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_closed() {
        for code in 0..14 {
            let fmt = PixelFormat::from_code(code).unwrap();
            assert_eq!(fmt.code(), code);
        }
        assert!(matches!(
            PixelFormat::from_code(14),
            Err(Error::UnsupportedFormat(14))
        ));
    }

    #[test]
    fn expand_quantize_is_a_retraction() {
        for bits in [1u32, 4, 5, 6] {
            for v in 0..1u16 << bits {
                assert_eq!(quantize_bits(expand_bits(v as u8, bits), bits), v as u8);
            }
        }
        // Replication is the rounded scale function for 1/4-bit widths
        // and within one step of it for 5/6-bit widths.
        for bits in [1u32, 4, 5, 6] {
            let max = (1u32 << bits) - 1;
            for v in 0..=max {
                let scaled = ((v * 255 + max / 2) / max) as i32;
                let diff = (expand_bits(v as u8, bits) as i32 - scaled).abs();
                if bits <= 4 {
                    assert_eq!(diff, 0);
                } else {
                    assert!(diff <= 1);
                }
            }
        }
    }

    #[test]
    fn rgba8888_round_trips_exactly() {
        let (w, h) = (8u32, 8u32);
        let rgba: Vec<u8> = (0..w * h * 4).map(|i| i as u8).collect();
        let raw = encode(PixelFormat::Rgba8888, &rgba, w, h).unwrap();
        assert_eq!(raw.len(), PixelFormat::Rgba8888.data_size(w, h));
        assert_eq!(decode(PixelFormat::Rgba8888, &raw, w, h).unwrap(), rgba);
    }

    #[test]
    fn rgb565_known_value() {
        // Pure red in RGB565 is 0xF800; one 8×8 image of it.
        let raw = [0x00u8, 0xf8].repeat(64);
        let rgba = decode(PixelFormat::Rgb565, &raw, 8, 8).unwrap();
        assert_eq!(&rgba[..4], &[0xff, 0x00, 0x00, 0xff]);
        assert_eq!(encode(PixelFormat::Rgb565, &rgba, 8, 8).unwrap(), raw);
    }

    #[test]
    fn sub8_formats_idempotent_after_first_quantization() {
        let (w, h) = (8u32, 8u32);
        let rgba: Vec<u8> = (0..w * h * 4).map(|i| (i * 5 + 1) as u8).collect();
        for fmt in [
            PixelFormat::Rgba5551,
            PixelFormat::Rgb565,
            PixelFormat::Rgba4444,
            PixelFormat::La44,
            PixelFormat::L4,
            PixelFormat::A4,
        ] {
            let once = decode(fmt, &encode(fmt, &rgba, w, h).unwrap(), w, h).unwrap();
            let twice = decode(fmt, &encode(fmt, &once, w, h).unwrap(), w, h).unwrap();
            assert_eq!(once, twice, "{fmt:?}");
        }
    }

    #[test]
    fn eight_bit_formats_round_trip_exactly() {
        let (w, h) = (8u32, 8u32);
        let rgba: Vec<u8> = (0..w * h * 4).map(|i| (i * 3) as u8).collect();
        assert_eq!(
            decode(
                PixelFormat::Rgba8888,
                &encode(PixelFormat::Rgba8888, &rgba, w, h).unwrap(),
                w,
                h
            )
            .unwrap(),
            rgba
        );
        // RGB888 fixes A = 255 and LA88 collapses RGB to luminance, so
        // the channels they store must survive a second pass unchanged.
        for fmt in [PixelFormat::Rgb888, PixelFormat::La88, PixelFormat::Hilo88] {
            let round = decode(fmt, &encode(fmt, &rgba, w, h).unwrap(), w, h).unwrap();
            let round2 = decode(fmt, &encode(fmt, &round, w, h).unwrap(), w, h).unwrap();
            assert_eq!(round, round2, "{fmt:?}");
        }
    }

    #[test]
    fn nibble_packing_is_low_nibble_first() {
        // 8×8 L4: pixel 0 = 0x0, pixel 1 = 0xf in Morton order; the first
        // stored byte must be 0xf0.
        let mut rgba = vec![0u8; 64 * 4];
        // Morton index 1 is pixel (1, 0).
        for c in 0..3 {
            rgba[4 + c] = 0xff;
        }
        rgba[3] = 0xff;
        rgba[7] = 0xff;
        let raw = encode(PixelFormat::L4, &rgba, 8, 8).unwrap();
        assert_eq!(raw.len(), 32);
        assert_eq!(raw[0], 0xf0);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let raw = vec![0u8; 10];
        assert!(matches!(
            decode(PixelFormat::Rgba8888, &raw, 8, 8),
            Err(Error::TruncatedData)
        ));
    }

    #[test]
    fn etc1_decodes_through_block_swizzle() {
        // A flat color survives tile(encode) -> decode(detile) within the
        // smallest modifier magnitude.
        let (w, h) = (8u32, 8u32);
        let rgba: Vec<u8> = [0x44u8, 0x88, 0xcc, 0xff].repeat(64);
        let raw = encode(PixelFormat::Etc1, &rgba, w, h).unwrap();
        assert_eq!(raw.len(), PixelFormat::Etc1.data_size(w, h));
        let out = decode(PixelFormat::Etc1, &raw, w, h).unwrap();
        for (a, b) in rgba.chunks(4).zip(out.chunks(4)) {
            for c in 0..3 {
                assert!((a[c] as i32 - b[c] as i32).abs() <= 2);
            }
            assert_eq!(b[3], 0xff);
        }
    }
}
