//! Error types for the extraction pipeline and asset cache.

use thiserror::Error;

/// Errors from extracting or caching assets.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive error.
    #[error("archive: {0}")]
    P4k(#[from] starbind_p4k::Error),

    /// Binary XML error.
    #[error("CryXmlB: {0}")]
    CryXml(#[from] starbind_cryxml::Error),

    /// Cache record (de)serialization error.
    #[error("cache record: {0}")]
    Json(#[from] serde_json::Error),

    /// Moving a finished cache file into place failed.
    #[error("cache write: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// No archive entry matched the request.
    #[error("asset '{name}' not found in archive")]
    NotFound { name: String },

    /// An asset name that cannot be used as a cache file name.
    #[error("invalid asset name {name:?}")]
    InvalidName { name: String },

    /// A plain-text entry was not valid UTF-8.
    #[error("asset '{name}' is not valid UTF-8: {source}")]
    InvalidText {
        name: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Result type for starbind operations.
pub type Result<T> = std::result::Result<T, Error>;
