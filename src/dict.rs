//! CGFX binary dictionary (DICT) reader.
//!
//! CGFX resolves named entries - textures, user data - through a compact
//! PATRICIA-style binary search tree instead of a flat name table. The
//! structure is an indexed array of fixed-size nodes; children are array
//! indices, so the in-memory model is an arena, not linked nodes.
//!
//! ## Layout
//! ```text
//! [0x00] Magic "DICT"              (4 bytes)
//! [0x04] DictSize                  (u32 LE)
//! [0x08] EntryCount                (u32 LE, root excluded)
//! [0x0C] Root node                 (16 bytes, RefBit = -1 sentinel)
//! [0x1C] EntryCount × node         (16 bytes each)
//! ```
//!
//! ## Node (16 bytes)
//! ```text
//! [0x00] RefBit                    (i32 LE) discriminant bit index
//! [0x04] LeftNode                  (u16 LE) array index
//! [0x06] RightNode                 (u16 LE) array index
//! [0x08] NameOffset (rel-to-field) (u32 LE)
//! [0x0C] DataOffset (rel-to-field) (u32 LE)
//! ```
//!
//! Offsets are stored relative to their own field position and resolved
//! to absolute stream positions at read time ([`crate::utils::rel_offset`]);
//! nothing relative survives parsing. Names are null-terminated and read
//! eagerly, so [`Dict::get`] needs no stream access.
//!
//! The tree is read-only: write-back replays the original dictionary
//! bytes untouched (same item count and order), so it is never rebuilt.

use std::io::{Read, Seek};

use crate::utils::{bytesa, le_i32, le_u16, le_u32, null_string_at, rel_offset};
use crate::Result;

/// One dictionary node. Index 0 is the root sentinel.
#[derive(Debug, Clone)]
pub struct DictNode {
    /// Discriminant bit index tested during traversal; -1 for the root.
    pub ref_bit: i32,
    /// Left child array index.
    pub left: u16,
    /// Right child array index.
    pub right: u16,
    /// Absolute stream position of the entry name (0 = none).
    pub name_offset: u64,
    /// Absolute stream position of the entry payload (0 = none).
    pub data_offset: u64,
    /// Entry name (empty for the root).
    pub name: String,
}

/// Parsed CGFX dictionary: root plus entries, in stored order.
#[derive(Debug, Clone)]
pub struct Dict {
    /// Total dictionary byte size from the header.
    pub size: u32,
    /// Arena of nodes; `nodes[0]` is the root.
    pub nodes: Vec<DictNode>,
}

impl Dict {
    /// Parse a dictionary at the current stream position.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let _magic = bytesa::<4>(r)?; // opaque; replayed via the header blob
        let size = le_u32(r)?;
        let entry_count = le_u32(r)?;

        let mut nodes = Vec::with_capacity(entry_count as usize + 1);
        for _ in 0..=entry_count {
            nodes.push(parse_node(r)?);
        }
        Ok(Self { size, nodes })
    }

    /// Entries in stored order, root excluded.
    pub fn entries(&self) -> &[DictNode] {
        &self.nodes[1..]
    }

    /// Number of entries (root excluded).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry by name.
    ///
    /// Walks the tree testing the key bit each node names, descending
    /// while the child's `ref_bit` exceeds the current node's; the walk
    /// ends on an upward link and the candidate's name decides the hit.
    pub fn get(&self, key: &str) -> Option<&DictNode> {
        let key = key.as_bytes();
        let mut cur = self.nodes.first()?;
        let mut next = self.nodes.get(cur.left as usize)?;
        while next.ref_bit > cur.ref_bit {
            cur = next;
            let idx = if key_bit(key, cur.ref_bit) {
                cur.right
            } else {
                cur.left
            };
            next = self.nodes.get(idx as usize)?;
        }
        (next.name.as_bytes() == key).then_some(next)
    }
}

fn parse_node<R: Read + Seek>(r: &mut R) -> Result<DictNode> {
    let ref_bit = le_i32(r)?;
    let left = le_u16(r)?;
    let right = le_u16(r)?;
    let name_offset = rel_offset(r)?;
    let data_offset = rel_offset(r)?;
    let name = if name_offset != 0 {
        null_string_at(r, name_offset)?
    } else {
        String::new()
    };
    Ok(DictNode {
        ref_bit,
        left,
        right,
        name_offset,
        data_offset,
        name,
    })
}

/// Bit `bit` of `key`: byte `bit / 8`, bit `bit % 8`; bits past the end
/// of the key read as 0.
fn key_bit(key: &[u8], bit: i32) -> bool {
    let byte = (bit / 8) as usize;
    match key.get(byte) {
        Some(&b) => b >> (bit % 8) & 1 == 1,
        None => false,
    }
}
