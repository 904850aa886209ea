//! Parsers and writers for CTR texture container formats.
//!
//! Each submodule targets one format family. All parsers follow the same
//! conventions:
//!
//! * **Generic over** [`std::io::Read`] + [`std::io::Seek`] - pass a
//!   [`std::io::Cursor`] over the whole input. Every format seeks both
//!   forwards and backwards, so the input must be fully available.
//! * **All or nothing** - `parse` either returns a fully populated
//!   container (headers, records, decoded pixel data) or an error;
//!   no partially populated container is ever observable.
//! * **Writers mirror parsers** - each container re-serializes itself
//!   with `write` / `to_bytes`, honoring every section offset its header
//!   records and replaying unmodified pixel payloads byte for byte.
//!
//! ## Format overview
//!
//! | Module   | Format | Description |
//! |----------|--------|-------------|
//! | [`cgfx`] | CGFX   | CTR graphics resource; textures resolved through a binary dictionary |
//! | [`ctpk`] | CTPK   | CTR texture package; flat descriptor table plus CRC32 name index |
//! | [`spr3`] | SPR3   | Sprite sheet envelope wrapping a complete nested CTPK |

pub mod cgfx;
pub mod ctpk;
pub mod spr3;

use crate::codec::{self, PixelFormat};
use crate::{Error, Result};

/// Dimension of mip level `level` for a base dimension, halved per level
/// and floored at 1.
#[inline]
pub(crate) fn mip_dim(base: u32, level: u32) -> u32 {
    (base >> level).max(1)
}

/// One logical texture: its metadata and mip chain.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Texture name, when the container records one.
    pub name: Option<String>,
    /// Level-0 width in pixels.
    pub width: u32,
    /// Level-0 height in pixels.
    pub height: u32,
    /// Level-0 pixel format.
    pub format: PixelFormat,
    /// Mip chain, level 0 first. Never empty (a stored mip count of 0
    /// means one level).
    pub mips: Vec<MipImage>,
}

/// Decoded pixel data for one mip level of one texture.
///
/// The original raw (tiled) bytes are kept alongside the decoded buffer;
/// serialization replays them verbatim unless the image was replaced, so
/// an untouched container round-trips exactly even for lossy formats.
#[derive(Debug, Clone)]
pub struct MipImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    rgba: Vec<u8>,
    raw: Vec<u8>,
    dirty: bool,
}

impl MipImage {
    /// Decode a mip image from its raw (tiled) bytes.
    pub(crate) fn from_raw(
        raw: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let rgba = codec::decode(format, &raw, width, height)?;
        Ok(Self {
            width,
            height,
            format,
            rgba,
            raw,
            dirty: false,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format this level is stored in.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row-major RGBA8888 pixels, `width * height * 4` bytes.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Replace the pixel buffer.
    ///
    /// `width`/`height` must match the level's current geometry
    /// ([`Error::DimensionMismatch`] otherwise; the image is left
    /// unchanged) and `rgba` must hold `width * height * 4` bytes.
    pub fn replace(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<()> {
        if (width, height) != (self.width, self.height) {
            return Err(Error::DimensionMismatch {
                expected: (self.width, self.height),
                got: (width, height),
            });
        }
        if rgba.len() != (width * height * 4) as usize {
            return Err(Error::TruncatedData);
        }
        self.rgba = rgba.to_vec();
        self.dirty = true;
        Ok(())
    }

    /// Raw (tiled) bytes to serialize: the original payload when the
    /// image is untouched, a fresh encode otherwise.
    pub(crate) fn to_raw(&self) -> Result<Vec<u8>> {
        if self.dirty {
            codec::encode(self.format, &self.rgba, self.width, self.height)
        } else {
            Ok(self.raw.clone())
        }
    }
}

/// Flat view over all mip images of a texture list, in container order
/// (textures in order, levels in order within each texture).
pub(crate) fn flat_images(textures: &[Texture]) -> impl Iterator<Item = &MipImage> {
    textures.iter().flat_map(|t| t.mips.iter())
}

/// Mutable access to the flat image at `index`.
pub(crate) fn flat_image_mut(textures: &mut [Texture], index: usize) -> Option<&mut MipImage> {
    textures
        .iter_mut()
        .flat_map(|t| t.mips.iter_mut())
        .nth(index)
}
