//! Format-agnostic container facade.
//!
//! [`Container::open`] sniffs the magic value of the input (CGFX and CTPK
//! at offset 0, SPR3 at offset 8) and dispatches to the matching parser.
//! The facade then exposes one uniform surface over all three families:
//! an ordered flat list of decoded images, in-place replacement by flat
//! index, and full re-serialization.

use std::io::Cursor;

use crate::formats::cgfx::Cgfx;
use crate::formats::ctpk::Ctpk;
use crate::formats::spr3::Spr3;
use crate::formats::{flat_image_mut, flat_images, Texture};
use crate::{Error, Result};

/// One entry of [`Container::images`].
#[derive(Debug, Clone)]
pub struct ImageEntry<'a> {
    /// Deterministic label, `"{name}.{index:02}.png"`.
    pub label: String,
    /// Row-major RGBA8888 pixels.
    pub rgba: &'a [u8],
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

#[derive(Debug, Clone)]
enum Family {
    Cgfx(Cgfx),
    Ctpk(Ctpk),
    Spr3(Spr3),
}

/// A parsed texture container of any supported family.
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    inner: Family,
}

impl Container {
    /// Parse `bytes` as whichever container family its magic announces.
    ///
    /// `name` labels the container's images (the source file name,
    /// typically); it is not stored in any serialized output.
    pub fn open(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let inner = match bytes.get(..4) {
            Some(b"CGFX") => Family::Cgfx(Cgfx::parse(&mut cur)?),
            Some(b"CTPK") => Family::Ctpk(Ctpk::parse(&mut cur)?),
            _ if bytes.get(8..12).map(|m| m == b"SPR3").unwrap_or(false) => {
                Family::Spr3(Spr3::parse(&mut cur)?)
            }
            _ => return Err(Error::MalformedContainer("unrecognized magic value")),
        };
        Ok(Self {
            name: name.to_string(),
            inner,
        })
    }

    fn textures(&self) -> &[Texture] {
        match &self.inner {
            Family::Cgfx(c) => &c.textures,
            Family::Ctpk(c) => &c.textures,
            Family::Spr3(c) => c.textures(),
        }
    }

    fn textures_mut(&mut self) -> &mut [Texture] {
        match &mut self.inner {
            Family::Cgfx(c) => &mut c.textures,
            Family::Ctpk(c) => &mut c.textures,
            Family::Spr3(c) => &mut c.ctpk.textures,
        }
    }

    /// All decoded images in container order (textures in order, mip
    /// levels in order within each texture).
    pub fn images(&self) -> Vec<ImageEntry<'_>> {
        flat_images(self.textures())
            .enumerate()
            .map(|(i, mip)| ImageEntry {
                label: format!("{}.{i:02}.png", self.name),
                rgba: mip.rgba(),
                width: mip.width(),
                height: mip.height(),
            })
            .collect()
    }

    /// Replace the image at flat index `index`.
    ///
    /// `rgba` must match the image's current dimensions; see
    /// [`crate::formats::MipImage::replace`].
    pub fn replace_image(
        &mut self,
        index: usize,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<()> {
        match flat_image_mut(self.textures_mut(), index) {
            Some(mip) => mip.replace(rgba, width, height),
            None => Err(Error::MalformedContainer("image index out of range")),
        }
    }

    /// Re-serialize the full container.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        match &self.inner {
            Family::Cgfx(c) => c.to_bytes(),
            Family::Ctpk(c) => c.to_bytes(),
            Family::Spr3(c) => c.to_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal CTPK: one RGB565 4×4 texture named `tex`, two mips would
    /// complicate the labels, so one level.
    fn ctpk_bytes() -> Vec<u8> {
        let hash_off = 0x48;
        let info_off = hash_off + 8;
        let tex_off = 0x60;

        let mut buf = Vec::new();
        buf.extend_from_slice(b"CTPK");
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        for v in [tex_off as u32, 32, hash_off as u32, info_off as u32] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.resize(0x20, 0);
        for v in [0u32, 32, 0, 3] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&[1, 0, 0, 0]);
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&32u32.to_le_bytes());
        buf.extend_from_slice(b"tex\0");
        buf.resize(hash_off, 0);
        buf.extend_from_slice(&crc32fast::hash(b"tex").to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&[3, 1, 0, 0]);
        buf.resize(tex_off, 0);
        buf.extend((0..32).map(|i| (i * 3 + 1) as u8));
        buf
    }

    /// Minimal CGFX: one DATA section, empty texture dictionary.
    fn cgfx_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"CGFX");
        buf.extend_from_slice(&0xfeffu16.to_le_bytes());
        buf.extend_from_slice(&0x14u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(b"DATA");
        buf.extend_from_slice(&(8u32 + 16 * 8).to_le_bytes());
        for i in 0..16u32 {
            buf.extend_from_slice(&0u32.to_le_bytes());
            // Entry 1 points at the dictionary right after the section.
            let rel = if i == 1 { 0x9c - (buf.len() as u32) } else { 0 };
            buf.extend_from_slice(&rel.to_le_bytes());
        }
        buf.extend_from_slice(b"DICT");
        buf.extend_from_slice(&(12u32 + 16).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        buf.extend_from_slice(&[0; 12]);
        buf
    }

    #[test]
    fn open_detects_cgfx_by_magic() {
        let bytes = cgfx_bytes();
        let container = Container::open("model.cgfx", &bytes).unwrap();
        assert!(container.images().is_empty());
        assert_eq!(container.serialize().unwrap(), bytes);
    }

    #[test]
    fn open_detects_ctpk_by_magic() {
        let bytes = ctpk_bytes();
        let container = Container::open("sheet.ctpk", &bytes).unwrap();
        let images = container.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].label, "sheet.ctpk.00.png");
        assert_eq!((images[0].width, images[0].height), (4, 4));
        assert_eq!(images[0].rgba.len(), 4 * 4 * 4);
    }

    #[test]
    fn open_detects_spr3_by_magic_at_offset_8() {
        let nested = ctpk_bytes();
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(b"SPR3");
        buf.extend_from_slice(&0x20u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // no sprite entries
        buf.extend_from_slice(&0x18u32.to_le_bytes());
        buf.extend_from_slice(&0x28u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0x28u32.to_le_bytes());
        buf.extend_from_slice(&nested);

        let container = Container::open("ui.spr3", &buf).unwrap();
        assert_eq!(container.images()[0].label, "ui.spr3.00.png");
        assert_eq!(container.serialize().unwrap(), buf);
    }

    #[test]
    fn replace_and_serialize_round_trip() {
        let bytes = ctpk_bytes();
        let mut container = Container::open("sheet", &bytes).unwrap();
        let fresh = vec![0x80u8; 4 * 4 * 4];
        container.replace_image(0, &fresh, 4, 4).unwrap();
        let out = container.serialize().unwrap();
        let reparsed = Container::open("sheet", &out).unwrap();
        // RGB565 drops the low bits; 0x80 expands to 0x84 on the 5-bit
        // channels and alpha saturates.
        let px = &reparsed.images()[0].rgba[..4];
        assert_eq!(px[0], 0x84); // 5-bit red
        assert_eq!(px[1], 0x82); // 6-bit green
        assert_eq!(px[3], 0xff);
    }

    #[test]
    fn replace_out_of_range_index_is_an_error() {
        let bytes = ctpk_bytes();
        let mut container = Container::open("sheet", &bytes).unwrap();
        let err = container.replace_image(7, &[0; 64], 4, 4).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn unrecognized_magic_is_rejected() {
        let err = Container::open("x", b"WHAT\0\0\0\0\0\0\0\0\0\0\0\0").unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }
}
