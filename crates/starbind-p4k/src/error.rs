//! Error types for the P4K crate.

use thiserror::Error;

use crate::zip::CompressionMethod;

/// Errors that can occur when working with P4K archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] starbind_common::Error),

    /// The walk reached the central directory (or the end of the file).
    #[error("end of entries at offset {offset:#x}{}", fmt_signature(.signature))]
    EndOfEntries {
        offset: u64,
        signature: Option<u32>,
    },

    /// A record boundary held a signature that is not a known record type.
    #[error("unknown record signature {signature:#010x} at offset {offset:#x}")]
    UnknownRecord { offset: u64, signature: u32 },

    /// Not enough bytes left in the archive for a record or payload.
    #[error("truncated {what} at offset {offset:#x}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Invalid extra field ID.
    #[error("invalid extra field ID at offset {offset:#x}: expected {expected:#06x}, got {actual:#06x}")]
    InvalidExtraFieldId {
        offset: u64,
        expected: u16,
        actual: u16,
    },

    /// Extra field with an unexpected declared size.
    #[error("invalid extra field size at offset {offset:#x}: expected {expected}, got {actual}")]
    InvalidExtraFieldSize {
        offset: u64,
        expected: u16,
        actual: u16,
    },

    /// A 32-bit size held the ZIP64 sentinel but no ZIP64 extension followed.
    #[error("entry {name:?} at offset {offset:#x} uses ZIP64 sizes but has no ZIP64 extra field")]
    MissingZip64Extension { offset: u64, name: String },

    /// Unsupported compression method.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// The decoder for a known method is not present in this build.
    #[error("decompression engine unavailable for {method:?}")]
    EngineUnavailable { method: CompressionMethod },

    /// The decompression engine reported an error.
    #[error("{method:?} decompression error: {message}")]
    Decompression {
        method: CompressionMethod,
        message: String,
    },

    /// Compressed input ran out before the engine finished its frame.
    #[error("{method:?} stream ended mid-frame after {produced} output bytes")]
    TruncatedStream {
        method: CompressionMethod,
        produced: u64,
    },

    /// The stream produced more than the caller allowed.
    #[error("{method:?} stream exceeded its {limit} byte output limit")]
    OutputLimit {
        method: CompressionMethod,
        limit: u64,
    },

    /// Decoded length differs from the header's uncompressed size.
    #[error("entry {name:?}: declared {declared} bytes, decoded {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },
}

fn fmt_signature(signature: &Option<u32>) -> String {
    match signature {
        Some(sig) => format!(" (signature {:#010x})", sig),
        None => " (end of file)".to_string(),
    }
}

impl Error {
    /// True when the walk ended cleanly at the central directory or end of file.
    pub fn is_end_of_entries(&self) -> bool {
        matches!(self, Self::EndOfEntries { .. })
    }

    /// True for malformed archive structure (bad signature, bounds, sizes).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownRecord { .. }
                | Self::Truncated { .. }
                | Self::InvalidExtraFieldId { .. }
                | Self::InvalidExtraFieldSize { .. }
                | Self::MissingZip64Extension { .. }
                | Self::Common(_)
        )
    }

    /// True for failures confined to decoding a single entry.
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCompression(_)
                | Self::EngineUnavailable { .. }
                | Self::Decompression { .. }
                | Self::TruncatedStream { .. }
                | Self::OutputLimit { .. }
                | Self::SizeMismatch { .. }
        )
    }
}

/// Result type for P4K operations.
pub type Result<T> = std::result::Result<T, Error>;
