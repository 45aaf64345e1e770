//! Common utilities for starbind.
//!
//! This crate provides the foundational pieces shared by the archive and
//! binary-XML crates:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`ReadExt`] - Helpers for pulling fixed-size records out of streams

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::{BinaryReader, ReadExt};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for fast null-terminator searches
pub use memchr;
