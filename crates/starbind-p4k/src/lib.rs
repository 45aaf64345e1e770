//! Streaming P4K archive reader for Star Citizen game files.
//!
//! The P4K format is a customized ZIP64 archive used by Star Citizen to
//! package game assets. Archives run to many gigabytes, so this crate never
//! loads the central directory: it walks local file headers front to back,
//! stops at the central directory boundary, and seeks straight to the
//! payload of the entry it wants.
//!
//! - [`read_entry_header`] resolves one local header and its ZIP64 extension
//! - [`ArchiveScanner`] walks records and selects the best match for a [`Target`]
//! - [`CompressionMethod`] dispatches an entry to its decoder
//! - [`StreamDecoder`] pumps compressed bytes through a [`StreamEngine`]
//!
//! Supported compression methods:
//!
//! - Store (method 0)
//! - DEFLATE (method 8, `deflate` feature)
//! - Zstandard (method 100, `zstd` feature)
//!
//! # Example
//!
//! ```no_run
//! use starbind_p4k::{ArchiveScanner, Target};
//!
//! let mut scanner = ArchiveScanner::open("Data.p4k")?;
//! let target = Target::suffix("defaultProfile.xml")
//!     .with_canonical(r"Data\Libs\Config\defaultProfile.xml");
//!
//! if let Some(entry) = scanner.find(&target)? {
//!     let data = scanner.read(&entry)?;
//!     println!("{}: {} bytes", entry.name(), data.len());
//! }
//! # Ok::<(), starbind_p4k::Error>(())
//! ```

mod codec;
mod entry;
mod error;
mod header;
mod scanner;
mod stream;
pub mod zip;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use codec::decode_entry;
pub use entry::{ArchiveEntry, DosDateTime};
pub use error::{Error, Result};
pub use header::read_entry_header;
pub use scanner::{ArchiveScanner, Entries, MatchKind, Matcher, Target};
pub use stream::{Step, StoreEngine, StreamDecoder, StreamEngine, DEFAULT_CHUNK_SIZE};
pub use zip::CompressionMethod;

#[cfg(feature = "deflate")]
pub use stream::DeflateEngine;
#[cfg(feature = "zstd")]
pub use stream::ZstdEngine;
