//! Local File Header structures.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Local File Header (without signature).
///
/// This structure precedes the file name, extra field and payload of every
/// entry. The 4-byte signature is read separately before this struct.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct LocalFileHeader {
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose bit flag
    pub flags: u16,
    /// Compression method
    pub compression_method: u16,
    /// File last modification time (DOS format)
    pub mod_time: u16,
    /// File last modification date (DOS format)
    pub mod_date: u16,
    /// CRC-32 of uncompressed data
    pub crc32: u32,
    /// Compressed size (0xFFFFFFFF when stored in the ZIP64 extra field)
    pub compressed_size: u32,
    /// Uncompressed size (0xFFFFFFFF when stored in the ZIP64 extra field)
    pub uncompressed_size: u32,
    /// File name length
    pub file_name_length: u16,
    /// Extra field length
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Size of the header without its signature.
    pub const SIZE: usize = 26;

    /// Size of the header including its 4-byte signature.
    pub const RECORD_SIZE: usize = Self::SIZE + 4;

    /// Sentinel meaning "the real value lives in the ZIP64 extra field".
    pub const ZIP64_SENTINEL: u32 = u32::MAX;

    /// Total variable-length data size following this header.
    pub fn variable_data_size(&self) -> usize {
        self.file_name_length as usize + self.extra_field_length as usize
    }
}
