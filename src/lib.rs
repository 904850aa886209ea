//! **ctrtex** - a Rust library for CTR (3DS) texture containers.
//!
//! Parses the proprietary texture archives of the console's graphics
//! pipeline, decodes their images to plain RGBA8888 buffers, and writes
//! edited pixels back into byte-compatible containers.
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::cgfx`] | CGFX - graphics resource with dictionary-indexed textures |
//! | [`formats::ctpk`] | CTPK - flat texture package with CRC32 name index |
//! | [`formats::spr3`] | SPR3 - sprite sheet envelope around a CTPK |
//!
//! [`container::Container`] auto-detects the family by magic value and
//! exposes the same open / list / replace / serialize surface over all
//! three. [`codec`] and [`swizzle`] handle the per-pixel work: format
//! codes 0-13 (RGBA8888 through ETC1A4) and the GPU's Morton tiling.

pub mod codec;
pub mod container;
pub mod dict;
pub mod error;
pub mod formats;
pub mod swizzle;
pub(crate) mod utils;

pub use container::{Container, ImageEntry};
pub use error::{Error, Result};
