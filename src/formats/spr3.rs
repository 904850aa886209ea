//! SPR3 - sprite sheet envelope.
//!
//! SPR3 wraps a complete [`Ctpk`] texture package together with a table
//! of sprite entries. The entries are carried opaquely; only the nested
//! package's pixel data is ever interpreted or regenerated.
//!
//! ## Layout
//! ```text
//! [0x00] Const1             (u32 LE)
//! [0x04] Const2             (u32 LE)
//! [0x08] Magic "SPR3"       (4 bytes)
//! [0x0C] HeaderSize         (u32 LE)
//! [0x10] Unk1               (u32 LE)
//! [0x14] Unk2               (u16 LE)
//! [0x16] EntryCount         (u16 LE)
//! [0x18] DataValOffset      (u32 LE)
//! [0x1C] EntryOffset        (u32 LE)
//! [0x20] Reserved           (u32 LE, written as 0)
//! [0x24] DataOffset         (u32 LE)
//! [0x28] EntryCount × sprite entry (u32 zero + u32 offset)
//! [...]  EntryCount × 0x80-byte sprite record
//! [DataOffset] nested CTPK package, through end of stream
//! ```
//!
//! On write the data offset is not trusted from the original header: it
//! is recomputed as `0x28 + count * 8 + count * 0x80`, the position right
//! after the sprite records, and the nested package is appended there.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::formats::ctpk::Ctpk;
use crate::formats::Texture;
use crate::utils::{bytesa, bytesv, le_u16, le_u32, magic, seek_to, w_u16, w_u32};
use crate::Result;

/// One sprite entry and its fixed-size record, both opaque.
#[derive(Debug, Clone)]
struct SpriteEntry {
    zero: u32,
    offset: u32,
    record: [u8; 0x80],
}

/// Parsed SPR3 sprite sheet.
#[derive(Debug, Clone)]
pub struct Spr3 {
    const1: u32,
    const2: u32,
    header_size: u32,
    unk1: u32,
    unk2: u16,
    data_val_offset: u32,
    entry_offset: u32,
    entries: Vec<SpriteEntry>,
    /// The wrapped texture package.
    pub ctpk: Ctpk,
}

impl Spr3 {
    /// Parse an SPR3 sheet from `r`.
    ///
    /// The stream must start at the first header field; the magic sits
    /// at offset 8.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let const1 = le_u32(r)?;
        let const2 = le_u32(r)?;
        magic(r, b"SPR3")?;
        let header_size = le_u32(r)?;
        let unk1 = le_u32(r)?;
        let unk2 = le_u16(r)?;
        let entry_count = le_u16(r)? as usize;
        let data_val_offset = le_u32(r)?;
        let entry_offset = le_u32(r)?;
        let _reserved = le_u32(r)?;
        let data_offset = le_u32(r)?;

        let mut entries = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            entries.push(SpriteEntry {
                zero: le_u32(r)?,
                offset: le_u32(r)?,
                record: [0; 0x80],
            });
        }
        for entry in &mut entries {
            entry.record = bytesa::<0x80>(r)?;
        }

        // The nested package's section offsets are relative to its own
        // start, so it parses from a window over the tail of the stream.
        let end = r.seek(SeekFrom::End(0))?;
        seek_to(r, data_offset as u64)?;
        let nested = bytesv(r, (end - data_offset as u64) as usize)?;
        let ctpk = Ctpk::parse(&mut Cursor::new(nested))?;

        Ok(Self {
            const1,
            const2,
            header_size,
            unk1,
            unk2,
            data_val_offset,
            entry_offset,
            entries,
            ctpk,
        })
    }

    /// Serialize the sheet: header and sprite records verbatim, nested
    /// package appended at the recomputed data offset.
    pub fn write<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        w_u32(w, self.const1)?;
        w_u32(w, self.const2)?;
        w.write_all(b"SPR3")?;
        w_u32(w, self.header_size)?;
        w_u32(w, self.unk1)?;
        w_u16(w, self.unk2)?;
        w_u16(w, self.entries.len() as u16)?;
        w_u32(w, self.data_val_offset)?;
        w_u32(w, self.entry_offset)?;
        w_u32(w, 0)?;
        let data_offset = 0x28 + self.entries.len() * 8 + self.entries.len() * 0x80;
        w_u32(w, data_offset as u32)?;

        for entry in &self.entries {
            w_u32(w, entry.zero)?;
            w_u32(w, entry.offset)?;
        }
        for entry in &self.entries {
            w.write_all(&entry.record)?;
        }

        w.write_all(&self.ctpk.to_bytes()?)?;
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cur = Cursor::new(Vec::new());
        self.write(&mut cur)?;
        Ok(cur.into_inner())
    }

    /// Textures of the wrapped package.
    pub fn textures(&self) -> &[Texture] {
        &self.ctpk.textures
    }
}
