//! CTPK (CTR Texture PacKage) - flat texture archive.
//!
//! ## Layout
//! ```text
//! [0x00] CTPK header   (0x18 bytes used; descriptors begin at 0x20)
//! [0x20] TexCount × texture descriptor (0x20 bytes each)
//! [...]  Per-texture mip data sizes (MipCount × u32 each)
//! [...]  Null-terminated texture names
//! [HashSecOffset]
//!        TexCount × hash entry (u32 CRC32 of the name + u32 texture index),
//!        stored sorted by CRC32
//! [TexInfoOffset]
//!        TexCount × mip descriptor (4 bytes)
//! [TexSecOffset]
//!        Pixel data; each texture's level 0 at TexSecOffset + TexOffset,
//!        sublevels contiguously after it in descending size order
//! ```
//!
//! ## CTPK Header
//! ```text
//! [0x00] Magic "CTPK"       (4 bytes)
//! [0x04] Version            (u16 LE)
//! [0x06] TexCount           (u16 LE)
//! [0x08] TexSecOffset       (u32 LE)
//! [0x0C] TexSecSize         (u32 LE)
//! [0x10] HashSecOffset      (u32 LE)
//! [0x14] TexInfoOffset      (u32 LE)
//! ```
//!
//! ## Texture descriptor (0x20 bytes)
//! ```text
//! [0x00] NameOffset         (u32 LE)
//! [0x04] TexDataSize        (u32 LE) level-0 byte count (0 = derive)
//! [0x08] TexOffset          (u32 LE) relative to TexSecOffset
//! [0x0C] Format             (u32 LE) codec table code
//! [0x10] Width              (u16 LE)
//! [0x12] Height             (u16 LE)
//! [0x14] MipCount           (u8, 0 means 1)
//! [0x15] Type               (u8)
//! [0x16] Zero               (u16)
//! [0x18] SizeListOffset     (u32 LE)
//! [0x1C] Timestamp          (u32 LE)
//! ```
//!
//! ## Mip descriptor (4 bytes)
//! ```text
//! [0x00] MipFormat (u8)  format code for sublevels (level 0 keeps the
//!                        descriptor format; the two may differ)
//! [0x01] MipCount  (u8)
//! [0x02] Compression / CompMethod (2 bytes, unused)
//! ```
//!
//! A recorded per-mip size of 0 means "derive the byte count from the
//! format and the level's dimensions" rather than trust a stored value.
//! Mip level `k`'s dimensions are the level-0 dimensions right-shifted by
//! `k`, floored at 1 - always derived from level 0, never reconstructed
//! from a sublevel.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::codec::PixelFormat;
use crate::formats::{mip_dim, MipImage, Texture};
use crate::utils::{
    bytesa, bytesv, le_u16, le_u32, magic, pad_to, read_null_string, seek_to, u8, w_u16, w_u32,
};
use crate::Result;

/// Texture descriptors begin here regardless of header size.
const DESC_OFFSET: u64 = 0x20;

/// (CRC32-of-name, texture index) pair from the hash section.
#[derive(Debug, Clone, Copy)]
struct HashEntry {
    crc32: u32,
    index: u32,
}

/// Per-texture metadata replayed verbatim on write.
#[derive(Debug, Clone)]
struct TexDesc {
    name_offset: u32,
    data_size: u32,
    tex_offset: u32,
    format: u32,
    width: u16,
    height: u16,
    mip_count: u8,
    kind: u8,
    zero: u16,
    size_list_offset: u32,
    timestamp: u32,
    sizes: Vec<u32>,
    name: String,
    hash: HashEntry,
    mip_format: u8,
    mip_info: [u8; 4],
}

/// Parsed CTPK texture package.
#[derive(Debug, Clone)]
pub struct Ctpk {
    version: u16,
    tex_sec_offset: u32,
    tex_sec_size: u32,
    hash_sec_offset: u32,
    tex_info_offset: u32,
    descs: Vec<TexDesc>,
    /// Decoded textures, in descriptor order.
    pub textures: Vec<Texture>,
}

impl Ctpk {
    /// Parse a CTPK package from `r`.
    ///
    /// The stream must start at the CTPK magic; every section offset in
    /// the header is relative to it.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        magic(r, b"CTPK")?;
        let version = le_u16(r)?;
        let tex_count = le_u16(r)? as usize;
        let tex_sec_offset = le_u32(r)?;
        let tex_sec_size = le_u32(r)?;
        let hash_sec_offset = le_u32(r)?;
        let tex_info_offset = le_u32(r)?;

        // Descriptor table
        r.seek(SeekFrom::Start(DESC_OFFSET))?;
        let mut descs = Vec::with_capacity(tex_count);
        for _ in 0..tex_count {
            descs.push(parse_desc(r)?);
        }

        // Mip data size lists, then names, both in descriptor order.
        for desc in &mut descs {
            for _ in 0..desc.mip_count {
                desc.sizes.push(le_u32(r)?);
            }
        }
        for desc in &mut descs {
            desc.name = read_null_string(r)?;
        }

        // Hash entries are stored sorted by checksum; the embedded index
        // maps each back to its texture.
        seek_to(r, hash_sec_offset as u64)?;
        let mut hashes = Vec::with_capacity(tex_count);
        for _ in 0..tex_count {
            hashes.push(HashEntry {
                crc32: le_u32(r)?,
                index: le_u32(r)?,
            });
        }
        hashes.sort_by_key(|h| h.index);
        for (desc, hash) in descs.iter_mut().zip(hashes) {
            desc.hash = hash;
        }

        // Mip descriptors
        seek_to(r, tex_info_offset as u64)?;
        for desc in &mut descs {
            let info = bytesa::<4>(r)?;
            desc.mip_format = info[0];
            desc.mip_info = info;
        }

        // Pixel data
        let mut textures = Vec::with_capacity(tex_count);
        for desc in &descs {
            textures.push(parse_texture(r, tex_sec_offset, desc)?);
        }

        Ok(Self {
            version,
            tex_sec_offset,
            tex_sec_size,
            hash_sec_offset,
            tex_info_offset,
            descs,
            textures,
        })
    }

    /// Serialize the package, honoring every section offset the header
    /// records and re-sorting hash entries by checksum.
    pub fn write<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        w.write_all(b"CTPK")?;
        w_u16(w, self.version)?;
        w_u16(w, self.descs.len() as u16)?;
        w_u32(w, self.tex_sec_offset)?;
        w_u32(w, self.tex_sec_size)?;
        w_u32(w, self.hash_sec_offset)?;
        w_u32(w, self.tex_info_offset)?;

        pad_to(w, DESC_OFFSET)?;
        for desc in &self.descs {
            write_desc(w, desc)?;
        }
        for desc in &self.descs {
            for &size in &desc.sizes {
                w_u32(w, size)?;
            }
        }
        for desc in &self.descs {
            w.write_all(desc.name.as_bytes())?;
            w.write_all(&[0])?;
        }

        pad_to(w, self.hash_sec_offset as u64)?;
        let mut hashes: Vec<HashEntry> = self.descs.iter().map(|d| d.hash).collect();
        hashes.sort_by_key(|h| h.crc32);
        for hash in hashes {
            w_u32(w, hash.crc32)?;
            w_u32(w, hash.index)?;
        }

        pad_to(w, self.tex_info_offset as u64)?;
        for desc in &self.descs {
            w.write_all(&desc.mip_info)?;
        }

        pad_to(w, self.tex_sec_offset as u64)?;
        for (desc, tex) in self.descs.iter().zip(&self.textures) {
            pad_to(w, self.tex_sec_offset as u64 + desc.tex_offset as u64)?;
            for mip in &tex.mips {
                w.write_all(&mip.to_raw()?)?;
            }
        }
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cur = Cursor::new(Vec::new());
        self.write(&mut cur)?;
        Ok(cur.into_inner())
    }

    /// Find a texture by its exact name.
    ///
    /// Uses checksum-then-name comparison against the stored hash
    /// entries.
    pub fn texture_by_name(&self, name: &str) -> Option<&Texture> {
        let target = crc32fast::hash(name.as_bytes());
        self.descs
            .iter()
            .position(|d| d.hash.crc32 == target && d.name == name)
            .map(|i| &self.textures[i])
    }
}

fn parse_desc<R: Read + Seek>(r: &mut R) -> Result<TexDesc> {
    Ok(TexDesc {
        name_offset: le_u32(r)?,
        data_size: le_u32(r)?,
        tex_offset: le_u32(r)?,
        format: le_u32(r)?,
        width: le_u16(r)?,
        height: le_u16(r)?,
        mip_count: u8(r)?,
        kind: u8(r)?,
        zero: le_u16(r)?,
        size_list_offset: le_u32(r)?,
        timestamp: le_u32(r)?,
        sizes: Vec::new(),
        name: String::new(),
        hash: HashEntry { crc32: 0, index: 0 },
        mip_format: 0,
        mip_info: [0; 4],
    })
}

fn write_desc<W: Write>(w: &mut W, d: &TexDesc) -> Result<()> {
    w_u32(w, d.name_offset)?;
    w_u32(w, d.data_size)?;
    w_u32(w, d.tex_offset)?;
    w_u32(w, d.format)?;
    w_u16(w, d.width)?;
    w_u16(w, d.height)?;
    w.write_all(&[d.mip_count, d.kind])?;
    w_u16(w, d.zero)?;
    w_u32(w, d.size_list_offset)?;
    w_u32(w, d.timestamp)?;
    Ok(())
}

fn parse_texture<R: Read + Seek>(r: &mut R, tex_sec_offset: u32, desc: &TexDesc) -> Result<Texture> {
    let format = PixelFormat::from_code(desc.format)?;
    let (width, height) = (desc.width as u32, desc.height as u32);
    let levels = desc.mip_count.max(1) as u32;

    seek_to(r, tex_sec_offset as u64 + desc.tex_offset as u64)?;

    // Level 0: recorded size list entry, else the descriptor size, else
    // derived from format and geometry.
    let size0 = match desc.sizes.first().copied().unwrap_or(0) {
        0 if desc.data_size == 0 => format.data_size(width, height),
        0 => desc.data_size as usize,
        s => s as usize,
    };
    let mut mips = vec![MipImage::from_raw(bytesv(r, size0)?, format, width, height)?];

    // Sublevels may use a different format than level 0. The mip
    // descriptor's format byte only means anything when sublevels exist;
    // single-level textures carry whatever junk the packer left there.
    for level in 1..levels {
        let mip_format = PixelFormat::from_code(desc.mip_format as u32)?;
        let (w, h) = (mip_dim(width, level), mip_dim(height, level));
        let size = match desc.sizes.get(level as usize).copied().unwrap_or(0) {
            0 => mip_format.data_size(w, h),
            s => s as usize,
        };
        mips.push(MipImage::from_raw(bytesv(r, size)?, mip_format, w, h)?);
    }

    Ok(Texture {
        name: Some(desc.name.clone()),
        width,
        height,
        format,
        mips,
    })
}
