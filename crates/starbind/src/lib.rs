//! Starbind - default keybinding profile and localization extraction for
//! Star Citizen.
//!
//! This crate ties the format crates together into the pipeline callers
//! actually want: find an asset in a P4K archive, decode it, render CryXmlB
//! to XML text, and keep the result in a local cache keyed by the archive's
//! modification time.
//!
//! # Crates
//!
//! - [`starbind_common`] - Bounded binary reading
//! - [`starbind_p4k`] - P4K archive scanning and decompression (Store, Deflate, Zstd)
//! - [`starbind_cryxml`] - CryXmlB binary XML decoding
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use starbind::prelude::*;
//!
//! let cache = AssetCache::new("cache");
//! let texts = cache.get_or_refresh(
//!     Path::new(r"C:\Program Files\Roberts Space Industries\StarCitizen\LIVE\Data.p4k"),
//!     &[AssetRequest::default_profile(), AssetRequest::language("english")?],
//! )?;
//!
//! let strings = Localization::parse(&texts["language.english"]);
//! println!("{} strings", strings.len());
//! # Ok::<(), starbind::Error>(())
//! ```

mod assets;
mod cache;
mod error;
mod localization;

pub use starbind_common as common;
pub use starbind_cryxml as cryxml;
pub use starbind_p4k as p4k;

pub use assets::{
    decode_text, extract_assets, AssetKind, AssetRequest, ExtractedAsset, DEFAULT_PROFILE_PATH,
};
pub use cache::{AssetCache, CachedAsset};
pub use error::{Error, Result};
pub use localization::Localization;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{AssetCache, AssetKind, AssetRequest, Localization};
    pub use starbind_cryxml::{CryXml, XmlOptions};
    pub use starbind_p4k::{ArchiveEntry, ArchiveScanner, Target};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
