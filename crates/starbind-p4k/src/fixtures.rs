//! Synthetic archive writer for tests.
//!
//! Builds just enough of a P4K file to exercise the scanner: local headers
//! with optional ZIP64 extensions, raw payloads, and a stub central
//! directory so the walk has a boundary to stop at. Payloads are written
//! as given; compress them first for non-store methods.

use zerocopy::IntoBytes;

use crate::entry::DosDateTime;
use crate::zip::{signature, CompressionMethod, LocalFileHeader, Zip64Extension};

/// One entry to be written by [`ArchiveWriter`].
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    name: String,
    method: u16,
    payload: Vec<u8>,
    uncompressed_size: u64,
    modified: DosDateTime,
    signature: u32,
    zip64: bool,
    sentinel_only: bool,
    trailing_extra: Vec<u8>,
}

impl FixtureEntry {
    /// An entry with an explicit method tag and pre-encoded payload.
    pub fn new(
        name: impl Into<String>,
        method: u16,
        payload: Vec<u8>,
        uncompressed_size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            payload,
            uncompressed_size,
            modified: DosDateTime::from_parts(2024, 1, 1, 12, 0, 0),
            signature: signature::LOCAL_FILE,
            zip64: false,
            sentinel_only: false,
            trailing_extra: Vec::new(),
        }
    }

    /// A stored (uncompressed) entry.
    pub fn stored(name: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::new(name, CompressionMethod::Store.tag(), data, size)
    }

    /// Write sizes through a ZIP64 extra field with sentinel 32-bit sizes.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    /// Write sentinel 32-bit sizes but omit the ZIP64 extra field.
    pub fn sentinel_without_zip64(mut self) -> Self {
        self.sentinel_only = true;
        self
    }

    /// Append raw bytes to the extra field after the ZIP64 record.
    pub fn trailing_extra(mut self, bytes: Vec<u8>) -> Self {
        self.trailing_extra = bytes;
        self
    }

    /// Set the modification stamp.
    pub fn modified(mut self, stamp: DosDateTime) -> Self {
        self.modified = stamp;
        self
    }

    /// Use the P4K extended local header signature.
    pub fn extended_signature(mut self) -> Self {
        self.signature = signature::LOCAL_FILE_EXTENDED;
        self
    }

    fn write(&self, out: &mut Vec<u8>) {
        let header_offset = out.len() as u64;
        let use_sentinel = self.zip64 || self.sentinel_only;

        let mut extra = Vec::new();
        if self.zip64 {
            let record = Zip64Extension {
                id: Zip64Extension::ID,
                data_size: Zip64Extension::DATA_SIZE,
                uncompressed_size: self.uncompressed_size,
                compressed_size: self.payload.len() as u64,
                local_header_offset: header_offset,
                disk_start: 0,
            };
            extra.extend_from_slice(record.as_bytes());
        }
        extra.extend_from_slice(&self.trailing_extra);

        let header = LocalFileHeader {
            version_needed: 45,
            flags: 0,
            compression_method: self.method,
            mod_time: self.modified.time,
            mod_date: self.modified.date,
            crc32: 0,
            compressed_size: if use_sentinel {
                LocalFileHeader::ZIP64_SENTINEL
            } else {
                self.payload.len() as u32
            },
            uncompressed_size: if use_sentinel {
                LocalFileHeader::ZIP64_SENTINEL
            } else {
                self.uncompressed_size as u32
            },
            file_name_length: self.name.len() as u16,
            extra_field_length: extra.len() as u16,
        };

        out.extend_from_slice(&self.signature.to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&extra);
        out.extend_from_slice(&self.payload);
    }
}

/// Writes a synthetic archive from a list of entries.
#[derive(Debug, Default, Clone)]
pub struct ArchiveWriter {
    entries: Vec<FixtureEntry>,
}

impl ArchiveWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stored entry.
    pub fn stored(self, name: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        self.entry(FixtureEntry::stored(name, data.as_ref().to_vec()))
    }

    /// Add an entry.
    pub fn entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Write the local entries only, with no central directory after them.
    pub fn finish_entries_only(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            entry.write(&mut out);
        }
        out
    }

    /// Write the entries followed by a stub central directory and trailer.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = self.finish_entries_only();
        out.extend_from_slice(&signature::CENTRAL_DIRECTORY.to_le_bytes());
        out.extend_from_slice(&[0u8; 42]);
        out.extend_from_slice(&signature::END_OF_CENTRAL_DIRECTORY.to_le_bytes());
        out.extend_from_slice(&[0u8; 18]);
        out
    }
}
