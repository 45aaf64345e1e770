//! ZIP format structures.
//!
//! This module contains the low-level record layouts needed to walk a P4K
//! archive front to back: local file headers, the ZIP64 extra field, and the
//! signatures that mark where the entry records stop.

mod local;
mod zip64;

pub use local::LocalFileHeader;
pub use zip64::Zip64Extension;

/// Record signatures that can appear at a record boundary.
pub mod signature {
    /// Local file header (`PK\x03\x04`).
    pub const LOCAL_FILE: u32 = 0x04034b50;
    /// Extended local file header used by P4K (`PK\x03\x14`).
    pub const LOCAL_FILE_EXTENDED: u32 = 0x14034b50;
    /// Central directory file header (`PK\x01\x02`).
    pub const CENTRAL_DIRECTORY: u32 = 0x02014b50;
    /// ZIP64 end of central directory record (`PK\x06\x06`).
    pub const ZIP64_END_OF_CENTRAL_DIRECTORY: u32 = 0x06064b50;
    /// ZIP64 end of central directory locator (`PK\x06\x07`).
    pub const ZIP64_LOCATOR: u32 = 0x07064b50;
    /// End of central directory record (`PK\x05\x06`).
    pub const END_OF_CENTRAL_DIRECTORY: u32 = 0x06054b50;
}

/// What a signature at a record boundary announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Another local file header follows.
    LocalFile,
    /// The entry records are over (central directory or trailer).
    EndOfEntries,
    /// Not a record this reader knows.
    Unknown,
}

impl RecordKind {
    /// Classify a 4-byte little-endian signature.
    pub fn classify(sig: u32) -> Self {
        match sig {
            signature::LOCAL_FILE | signature::LOCAL_FILE_EXTENDED => Self::LocalFile,
            signature::CENTRAL_DIRECTORY
            | signature::ZIP64_END_OF_CENTRAL_DIRECTORY
            | signature::ZIP64_LOCATOR
            | signature::END_OF_CENTRAL_DIRECTORY => Self::EndOfEntries,
            _ => Self::Unknown,
        }
    }
}

/// Compression methods used in P4K archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CompressionMethod {
    /// No compression (stored).
    Store = 0,
    /// DEFLATE compression.
    Deflate = 8,
    /// Zstandard compression (Star Citizen custom).
    Zstd = 100,
}

impl CompressionMethod {
    /// The numeric tag written in the header.
    #[inline]
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Whether a decoder for this method was compiled into this build.
    pub fn is_available(self) -> bool {
        match self {
            Self::Store => true,
            Self::Deflate => cfg!(feature = "deflate"),
            Self::Zstd => cfg!(feature = "zstd"),
        }
    }
}

impl TryFrom<u16> for CompressionMethod {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Store),
            8 => Ok(Self::Deflate),
            100 => Ok(Self::Zstd),
            other => Err(other),
        }
    }
}
