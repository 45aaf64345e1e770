//! ZIP64 extended information extra field.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// ZIP64 extra field as P4K writes it in local headers.
///
/// P4K always emits the full record (both sizes, the header offset and the
/// disk number), so it has a fixed 32-byte layout including its own ID and
/// size fields.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Zip64Extension {
    /// Extra field ID (always [`Zip64Extension::ID`])
    pub id: u16,
    /// Size of the data following the ID and size fields
    pub data_size: u16,
    /// Uncompressed size
    pub uncompressed_size: u64,
    /// Compressed size
    pub compressed_size: u64,
    /// Offset of the local header
    pub local_header_offset: u64,
    /// Disk where the entry starts
    pub disk_start: u32,
}

impl Zip64Extension {
    /// ZIP64 extended information extra field ID.
    pub const ID: u16 = 0x0001;

    /// Expected value of `data_size`.
    pub const DATA_SIZE: u16 = 28;

    /// Total size of the record.
    pub const SIZE: usize = 32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_size() {
        assert_eq!(std::mem::size_of::<Zip64Extension>(), Zip64Extension::SIZE);
        assert_eq!(
            Zip64Extension::SIZE - 4,
            Zip64Extension::DATA_SIZE as usize
        );
    }
}
