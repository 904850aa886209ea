//! CGFX - CTR graphics resource container.
//!
//! CGFX is a general resource archive; this parser consumes the texture
//! path: the second entry of the first DATA section points at a binary
//! dictionary ([`crate::dict`]) whose leaves locate one TXOB (texture
//! object) record each.
//!
//! ## Layout
//! ```text
//! [0x00] CGFX header   (0x14 bytes)
//! [0x14] EntryCount × section header (magic + u32 size); each "DATA"
//!        section is followed by 16 data entries (u32 count + rel offset)
//! [...]  Dictionary, TXOB records, names (located via resolved offsets)
//! [...]  Pixel data (located via each TXOB's data offset)
//! ```
//!
//! ## CGFX Header (0x14 bytes)
//! ```text
//! [0x00] Magic "CGFX"       (4 bytes)
//! [0x04] ByteOrder          (u16 LE, not interpreted)
//! [0x06] HeaderSize         (u16 LE)
//! [0x08] Revision           (u32 LE)
//! [0x0C] FileSize           (u32 LE)
//! [0x10] EntryCount         (u32 LE)
//! ```
//!
//! ## TXOB record
//! ```text
//! [0x00] Type               (u32 LE)
//! [0x04] Magic "TXOB"       (4 bytes, not checked)
//! [0x08] Revision           (u32 LE)
//! [0x0C] NameOffset         (u32 LE, rel-to-field)
//! [0x10] UserDataCount      (u32 LE)
//! [0x14] UserDataOffset     (u32 LE, rel-to-field, 0 = none)
//! [0x18] Height             (u32 LE)
//! [0x1C] Width              (u32 LE)
//! [0x20] GlFormat           (u32 LE)
//! [0x24] GlType             (u32 LE)
//! [0x28] MipCount           (u32 LE, 0 means 1)
//! [0x2C] TexObject          (u32 LE)
//! [0x30] LocationFlags      (u32 LE)
//! [0x34] Format             (u32 LE) codec table code, all levels
//! [0x38] UserDataSize       (u32 LE) counted from this field; when
//!        nonzero (> 4) a nested user-data dictionary follows inline
//! [...]  Height2, Width2    (u32 LE each)
//! [...]  DataSize           (u32 LE)
//! [...]  DataOffset         (u32 LE, rel-to-field)
//! [...]  DynamicAllocator, BitDepth, LocAddress, MemAddress (u32 each)
//! ```
//!
//! Everything before the first texture's pixel data (the whole input when
//! there are no textures) is retained as an opaque header blob and
//! replayed verbatim on write; the dictionary is therefore never rebuilt.
//! Only the pixel payloads are regenerated, at each record's declared
//! offset, in original texture and mip order.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::codec::PixelFormat;
use crate::dict::Dict;
use crate::formats::{mip_dim, MipImage, Texture};
use crate::utils::{bytesa, bytesv, le_u16, le_u32, magic, rel_offset, seek_to};
use crate::{Error, Result};

/// Texture-object metadata, offsets already absolute.
#[derive(Debug, Clone)]
struct TxobRecord {
    name_offset: u64,
    height: u32,
    width: u32,
    mip_count: u32,
    format: u32,
    /// Absolute position of the level-0 pixel data.
    data_offset: u64,
}

/// Parsed CGFX container.
#[derive(Debug, Clone)]
pub struct Cgfx {
    /// Opaque blob: all bytes before the first texture's pixel data.
    header: Vec<u8>,
    records: Vec<TxobRecord>,
    /// Decoded textures, in dictionary order.
    pub textures: Vec<Texture>,
}

impl Cgfx {
    /// Parse a CGFX container from `r`.
    ///
    /// The stream must start at the CGFX magic.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        magic(r, b"CGFX")?;
        let _byte_order = le_u16(r)?;
        let _header_size = le_u16(r)?;
        let _revision = le_u32(r)?;
        let _file_size = le_u32(r)?;
        let entry_count = le_u32(r)?;

        // Section headers; only DATA sections carry the 16 data entries
        // (entry count + resolved offset each).
        let mut data_entries = Vec::new();
        for _ in 0..entry_count {
            let section = bytesa::<4>(r)?;
            let _size = le_u32(r)?;
            if &section == b"DATA" {
                for _ in 0..16 {
                    let _entry_count = le_u32(r)?;
                    data_entries.push(rel_offset(r)?);
                }
            }
        }

        // Data entry 1 locates the texture dictionary.
        let tex_dict_offset = *data_entries
            .get(1)
            .ok_or(Error::MalformedContainer("missing texture data entry"))?;

        let mut records = Vec::new();
        if tex_dict_offset != 0 {
            seek_to(r, tex_dict_offset)?;
            let dict = Dict::parse(r)?;
            for node in dict.entries() {
                seek_to(r, node.data_offset)?;
                records.push(parse_txob(r)?);
            }
        }

        // Opaque header blob: everything before the first pixel byte.
        let end = r.seek(SeekFrom::End(0))?;
        let header_len = match records.first() {
            Some(rec) => rec.data_offset,
            None => end,
        };
        if header_len > end {
            return Err(Error::MalformedContainer("offset beyond end of stream"));
        }
        r.seek(SeekFrom::Start(0))?;
        let header = bytesv(r, header_len as usize)?;

        let mut textures = Vec::with_capacity(records.len());
        for rec in &records {
            textures.push(parse_texture(r, rec)?);
        }

        Ok(Self {
            header,
            records,
            textures,
        })
    }

    /// Serialize the container: the header blob verbatim, then each
    /// texture's mip chain at its record's declared offset.
    pub fn write<W: Write + Seek>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.header)?;
        for (rec, tex) in self.records.iter().zip(&self.textures) {
            w.seek(SeekFrom::Start(rec.data_offset))?;
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
}

fn parse_txob<R: Read + Seek>(r: &mut R) -> Result<TxobRecord> {
    let _type = le_u32(r)?;
    let _magic = bytesa::<4>(r)?;
    let _revision = le_u32(r)?;
    let name_offset = rel_offset(r)?;
    let _user_data_count = le_u32(r)?;
    let user_data_offset = rel_offset(r)?;
    let height = le_u32(r)?;
    let width = le_u32(r)?;
    let _gl_format = le_u32(r)?;
    let _gl_type = le_u32(r)?;
    let mip_count = le_u32(r)?;
    let _tex_object = le_u32(r)?;
    let _location_flags = le_u32(r)?;
    let format = le_u32(r)?;
    let user_data_size = le_u32(r)?;

    // The size counts from its own field; the user-data dictionary, when
    // present, follows inline and the remaining fields resume right
    // after it. Its contents are not interpreted.
    let user_data_start = r.stream_position()? - 4;
    if user_data_offset != 0 && user_data_size > 4 {
        Dict::parse(r)?;
        r.seek(SeekFrom::Start(user_data_start + user_data_size as u64))?;
    }

    let _height2 = le_u32(r)?;
    let _width2 = le_u32(r)?;
    let _data_size = le_u32(r)?;
    let data_offset = rel_offset(r)?;
    let _dynamic_allocator = le_u32(r)?;
    let _bit_depth = le_u32(r)?;
    let _loc_address = le_u32(r)?;
    let _mem_address = le_u32(r)?;

    if data_offset == 0 {
        return Err(Error::MalformedContainer("texture record without pixel data"));
    }

    Ok(TxobRecord {
        name_offset,
        height,
        width,
        mip_count,
        format,
        data_offset,
    })
}

fn parse_texture<R: Read + Seek>(r: &mut R, rec: &TxobRecord) -> Result<Texture> {
    let format = PixelFormat::from_code(rec.format)?;
    let levels = rec.mip_count.max(1);

    seek_to(r, rec.data_offset)?;
    let mut mips = Vec::with_capacity(levels as usize);
    for level in 0..levels {
        let (w, h) = (mip_dim(rec.width, level), mip_dim(rec.height, level));
        mips.push(MipImage::from_raw(
            bytesv(r, format.data_size(w, h))?,
            format,
            w,
            h,
        )?);
    }

    let name = if rec.name_offset != 0 {
        Some(crate::utils::null_string_at(r, rec.name_offset)?)
    } else {
        None
    };
    Ok(Texture {
        name: name.filter(|n| !n.is_empty()),
        width: rec.width,
        height: rec.height,
        format,
        mips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn w16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Relative offset targeting absolute position `abs` from the field
    /// about to be written at the current end of `buf`.
    fn rel(buf: &mut Vec<u8>, abs: u32) {
        let pos = buf.len() as u32;
        w32(buf, if abs == 0 { 0 } else { abs - pos });
    }

    /// One-texture CGFX: 8×8 RGBA8888, single mip level.
    fn fixture(payload: &[u8]) -> Vec<u8> {
        assert_eq!(payload.len(), 256);
        let dict_at = 0x9cu32; // after header + one DATA section
        let txob_at = dict_at + 12 + 2 * 16; // 0xc8
        let name_at = txob_at + 92; // 0x124
        let data_at = name_at + 4; // "tex\0"

        let mut buf = Vec::new();
        buf.extend_from_slice(b"CGFX");
        w16(&mut buf, 0xfeff);
        w16(&mut buf, 0x14);
        w32(&mut buf, 0);
        w32(&mut buf, data_at + 256); // file size
        w32(&mut buf, 1); // entry count

        buf.extend_from_slice(b"DATA");
        w32(&mut buf, 8 + 16 * 8);
        for i in 0..16u32 {
            if i == 1 {
                w32(&mut buf, 1);
                rel(&mut buf, dict_at);
            } else {
                w32(&mut buf, 0);
                w32(&mut buf, 0);
            }
        }
        assert_eq!(buf.len(), dict_at as usize);

        // Dictionary: root + one entry pointing at the TXOB.
        buf.extend_from_slice(b"DICT");
        w32(&mut buf, 12 + 2 * 16);
        w32(&mut buf, 1);
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        w16(&mut buf, 1);
        w16(&mut buf, 1);
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        buf.extend_from_slice(&0i32.to_le_bytes());
        w16(&mut buf, 1);
        w16(&mut buf, 1);
        rel(&mut buf, name_at);
        rel(&mut buf, txob_at);
        assert_eq!(buf.len(), txob_at as usize);

        // TXOB record
        w32(&mut buf, 0x20000011);
        buf.extend_from_slice(b"TXOB");
        w32(&mut buf, 0);
        rel(&mut buf, name_at);
        w32(&mut buf, 0); // user data count
        w32(&mut buf, 0); // user data offset
        w32(&mut buf, 8); // height
        w32(&mut buf, 8); // width
        w32(&mut buf, 0x6752); // gl format
        w32(&mut buf, 0x1401); // gl type
        w32(&mut buf, 1); // mip count
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        w32(&mut buf, 0); // format: RGBA8888
        w32(&mut buf, 0); // user data size
        w32(&mut buf, 8); // height2
        w32(&mut buf, 8); // width2
        w32(&mut buf, 256); // data size
        rel(&mut buf, data_at);
        w32(&mut buf, 0);
        w32(&mut buf, 32); // bit depth
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        assert_eq!(buf.len(), name_at as usize);

        buf.extend_from_slice(b"tex\0");
        assert_eq!(buf.len(), data_at as usize);

        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn dictionary_leaf_locates_the_texture() {
        let payload: Vec<u8> = (0..256).map(|i| i as u8).collect();
        let bytes = fixture(&payload);
        let cgfx = Cgfx::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(cgfx.textures.len(), 1);
        let tex = &cgfx.textures[0];
        assert_eq!(tex.name.as_deref(), Some("tex"));
        assert_eq!((tex.width, tex.height), (8, 8));
        assert_eq!(tex.format, PixelFormat::Rgba8888);
        assert_eq!(
            tex.mips[0].rgba(),
            crate::codec::decode(PixelFormat::Rgba8888, &payload, 8, 8).unwrap()
        );
    }

    #[test]
    fn unmodified_round_trip_is_byte_exact() {
        let payload: Vec<u8> = (0..256).map(|i| (i * 3) as u8).collect();
        let bytes = fixture(&payload);
        let cgfx = Cgfx::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(cgfx.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn replaced_pixels_are_reencoded_at_the_declared_offset() {
        let payload: Vec<u8> = (0..256).map(|i| i as u8).collect();
        let bytes = fixture(&payload);
        let mut cgfx = Cgfx::parse(&mut Cursor::new(&bytes)).unwrap();
        let fresh = vec![0x5au8; 8 * 8 * 4];
        cgfx.textures[0].mips[0].replace(&fresh, 8, 8).unwrap();
        let out = cgfx.to_bytes().unwrap();
        // Header blob untouched, payload region regenerated.
        assert_eq!(out[..bytes.len() - 256], bytes[..bytes.len() - 256]);
        let reparsed = Cgfx::parse(&mut Cursor::new(&out)).unwrap();
        assert_eq!(reparsed.textures[0].mips[0].rgba(), &fresh[..]);
    }

    #[test]
    fn empty_dictionary_yields_no_textures() {
        // Same shape, but the dictionary has zero entries and nothing
        // else follows it.
        let mut buf = Vec::new();
        buf.extend_from_slice(b"CGFX");
        w16(&mut buf, 0xfeff);
        w16(&mut buf, 0x14);
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        w32(&mut buf, 1);
        buf.extend_from_slice(b"DATA");
        w32(&mut buf, 8 + 16 * 8);
        for i in 0..16u32 {
            if i == 1 {
                w32(&mut buf, 0);
                rel(&mut buf, 0x9c);
            } else {
                w32(&mut buf, 0);
                w32(&mut buf, 0);
            }
        }
        buf.extend_from_slice(b"DICT");
        w32(&mut buf, 12 + 16);
        w32(&mut buf, 0);
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        w16(&mut buf, 0);
        w16(&mut buf, 0);
        w32(&mut buf, 0);
        w32(&mut buf, 0);

        let cgfx = Cgfx::parse(&mut Cursor::new(&buf)).unwrap();
        assert!(cgfx.textures.is_empty());
        // The whole input is the header blob; write-back is the identity.
        assert_eq!(cgfx.to_bytes().unwrap(), buf);
    }

    #[test]
    fn dictionary_offset_beyond_stream_is_malformed() {
        let payload: Vec<u8> = (0..256).map(|i| i as u8).collect();
        let mut bytes = fixture(&payload);
        // Data entry 1's offset field sits at 0x28; point it past EOF.
        bytes[0x28..0x2c].copy_from_slice(&0x00ff_0000u32.to_le_bytes());
        let err = Cgfx::parse(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn wrong_magic_is_malformed() {
        let err = Cgfx::parse(&mut Cursor::new(b"XGFX\0\0\0\0".as_slice())).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }
}
