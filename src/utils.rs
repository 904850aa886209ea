//! Low-level I/O primitives shared by all parsers and writers.
//!
//! Each read function reads exactly the bytes it promises or returns an
//! error - there is no partial-read ambiguity. The write side mirrors it:
//! every helper emits exactly the bytes its name implies.
//!
//! All CTR container formats handled by this crate are little-endian.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

/// Read one byte.
#[inline]
pub(crate) fn u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

/// Read a little-endian `u16`.
#[inline]
pub(crate) fn le_u16<R: Read>(r: &mut R) -> Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_le_bytes(b))
}

/// Read a little-endian `u32`.
#[inline]
pub(crate) fn le_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

/// Read a little-endian `i32`.
#[inline]
pub(crate) fn le_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(i32::from_le_bytes(b))
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Read exactly `len` bytes into a `Vec`.
#[inline]
pub(crate) fn bytesv<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = vec![0u8; len];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Verify that the next `N` bytes in the stream match `expected`.
///
/// Returns [`Error::MalformedContainer`] on mismatch.
#[inline]
pub(crate) fn magic<R: Read, const N: usize>(r: &mut R, expected: &[u8; N]) -> Result<()> {
    let got = bytesa::<N>(r)?;
    if &got != expected {
        return Err(Error::MalformedContainer("bad magic value"));
    }
    Ok(())
}

/// Read a `u32` offset stored relative to its own field position and
/// resolve it to an absolute stream position.
///
/// CGFX encodes every internal pointer this way: the stored value counts
/// from the first byte of the offset field itself, so the absolute
/// position is `raw + position_after_field - 4`. A stored 0 is a null
/// pointer and stays 0. Unresolved relative offsets are never kept past
/// this call.
#[inline]
pub(crate) fn rel_offset<R: Read + Seek>(r: &mut R) -> Result<u64> {
    let raw = le_u32(r)?;
    if raw == 0 {
        return Ok(0);
    }
    let after = r.stream_position()?;
    Ok(raw as u64 + after - 4)
}

/// Seek to an absolute position recorded in a container field, rejecting
/// positions beyond the end of the stream.
///
/// A recorded offset that resolves outside the input is a structural
/// inconsistency, not a short read, so it surfaces as
/// [`Error::MalformedContainer`].
pub(crate) fn seek_to<R: Seek>(r: &mut R, target: u64) -> Result<()> {
    let end = r.seek(SeekFrom::End(0))?;
    if target > end {
        return Err(Error::MalformedContainer("offset beyond end of stream"));
    }
    r.seek(SeekFrom::Start(target))?;
    Ok(())
}

/// Read a null-terminated UTF-8 string byte-by-byte from a reader.
pub(crate) fn read_null_string<R: Read>(r: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let b = u8(r)?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a null-terminated string at an absolute position, restoring the
/// stream position afterwards.
pub(crate) fn null_string_at<R: Read + Seek>(r: &mut R, pos: u64) -> Result<String> {
    let saved = r.stream_position()?;
    r.seek(SeekFrom::Start(pos))?;
    let s = read_null_string(r)?;
    r.seek(SeekFrom::Start(saved))?;
    Ok(s)
}

/// Write a little-endian `u16`.
#[inline]
pub(crate) fn w_u16<W: Write>(w: &mut W, v: u16) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian `u32`.
#[inline]
pub(crate) fn w_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Advance the stream to absolute position `target`, filling the gap with
/// zero bytes.
///
/// Section offsets recorded in a header must be honored exactly on write;
/// a target behind the current position means the preceding sections
/// overran it, which is a structural error.
pub(crate) fn pad_to<W: Write + Seek>(w: &mut W, target: u64) -> Result<()> {
    let pos = w.stream_position()?;
    if pos > target {
        return Err(Error::MalformedContainer("section overruns recorded offset"));
    }
    let gap = (target - pos) as usize;
    if gap > 0 {
        w.write_all(&vec![0u8; gap])?;
    }
    Ok(())
}
