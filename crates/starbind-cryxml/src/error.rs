//! Error types for CryXmlB decoding and building.

use std::fmt;

use thiserror::Error;

/// One of the four flat tables of a CryXmlB document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Nodes,
    Attributes,
    Children,
    Strings,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nodes => "node",
            Self::Attributes => "attribute",
            Self::Children => "child index",
            Self::Strings => "string",
        })
    }
}

/// Errors that can occur when decoding or building CryXmlB documents.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] starbind_common::Error),

    /// Invalid magic bytes (not a CryXmlB file).
    #[error("invalid CryXmlB magic: expected 'CryXmlB\\0', got {actual:?}")]
    InvalidMagic { actual: Vec<u8> },

    /// A table extends past the end of the buffer.
    #[error("{table} table at {position:#x} ({size} bytes) exceeds buffer of {buffer_len} bytes")]
    TableOutOfBounds {
        table: Table,
        position: u64,
        size: u64,
        buffer_len: usize,
    },

    /// String table offset out of bounds.
    #[error("string offset {offset} out of bounds (string table size: {size})")]
    StringOffsetOutOfBounds { offset: u32, size: usize },

    /// A string runs past the maximum length without a terminator.
    #[error("string at offset {offset} exceeds {max} bytes without a terminator")]
    StringTooLong { offset: u32, max: usize },

    /// Node index out of bounds.
    #[error("node index {index} out of bounds (total nodes: {count})")]
    NodeIndexOutOfBounds { index: i64, count: usize },

    /// A node's attribute or child range falls outside its table.
    #[error("node {node}: {table} range {first}..+{count} out of bounds (table size: {size})")]
    RangeOutOfBounds {
        node: usize,
        table: Table,
        first: i32,
        count: usize,
        size: usize,
    },

    /// The traversal pushed more frames than the document can legitimately need.
    #[error("iteration limit {limit} exceeded at node {node} (depth {depth}); child table is cyclic or corrupt")]
    IterationLimit {
        limit: usize,
        node: usize,
        depth: usize,
    },

    /// The document has no root node.
    #[error("document has no nodes")]
    EmptyDocument,

    /// A count does not fit its on-disk field.
    #[error("too many {what}: {count}")]
    TooMany { what: &'static str, count: usize },

    /// UTF-8 decoding error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// XML writing error.
    #[error("XML error: {0}")]
    Xml(String),
}

impl Error {
    /// The error describes a malformed buffer rather than a writer failure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Common(_)
                | Self::InvalidMagic { .. }
                | Self::TableOutOfBounds { .. }
                | Self::StringOffsetOutOfBounds { .. }
                | Self::StringTooLong { .. }
                | Self::NodeIndexOutOfBounds { .. }
                | Self::RangeOutOfBounds { .. }
                | Self::IterationLimit { .. }
                | Self::EmptyDocument
                | Self::Utf8(_)
        )
    }
}

/// Result type for CryXmlB operations.
pub type Result<T> = std::result::Result<T, Error>;
