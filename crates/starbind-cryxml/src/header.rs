//! CryXmlB header structure.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// CryXmlB file header.
///
/// Follows the 8-byte magic "CryXmlB\0". Table positions are absolute byte
/// offsets from the start of the buffer, magic included.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CryXmlHeader {
    /// Size of everything after the magic. Informational only.
    pub xml_size: u32,
    /// Position of the node table.
    pub node_table_position: u32,
    /// Number of nodes.
    pub node_count: u32,
    /// Position of the attribute table.
    pub attribute_table_position: u32,
    /// Number of attributes.
    pub attribute_count: u32,
    /// Position of the child index table.
    pub child_table_position: u32,
    /// Number of child indices.
    pub child_count: u32,
    /// Position of the string table.
    pub string_data_position: u32,
    /// Size of the string table in bytes.
    pub string_data_size: u32,
}

impl CryXmlHeader {
    /// The magic bytes at the start of a CryXmlB file.
    pub const MAGIC: &'static [u8; 8] = b"CryXmlB\0";

    /// Size of the magic bytes.
    pub const MAGIC_LEN: usize = 8;

    /// Size of the header after the magic.
    pub const SIZE: usize = 36;
}
