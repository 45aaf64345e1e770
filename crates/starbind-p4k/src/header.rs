//! Local file header reading.

use std::io::{Read, Seek};

use log::trace;
use starbind_common::{BinaryReader, ReadExt};

use crate::entry::{ArchiveEntry, DosDateTime};
use crate::zip::{LocalFileHeader, RecordKind, Zip64Extension};
use crate::{Error, Result};

/// Read one local file header record at the current stream position.
///
/// On success the stream is left at the first payload byte of the entry, and
/// the returned entry carries the resolved (possibly 64-bit) sizes. The
/// payload is bounds-checked against `archive_len` so a truncated archive is
/// reported here rather than as a short read later.
///
/// A central directory or end-of-central-directory signature yields
/// [`Error::EndOfEntries`], as does a clean end of file at the record
/// boundary. Any other signature yields [`Error::UnknownRecord`].
pub fn read_entry_header<R: Read + Seek>(
    reader: &mut R,
    archive_len: u64,
) -> Result<ArchiveEntry> {
    let offset = reader.stream_position()?;

    let mut sig_bytes = [0u8; 4];
    let got = reader.read_fill(&mut sig_bytes)?;
    if got == 0 {
        return Err(Error::EndOfEntries {
            offset,
            signature: None,
        });
    }
    if got < sig_bytes.len() {
        return Err(Error::Truncated {
            what: "record signature",
            offset,
            needed: sig_bytes.len() as u64,
            available: got as u64,
        });
    }

    let signature = u32::from_le_bytes(sig_bytes);
    match RecordKind::classify(signature) {
        RecordKind::LocalFile => {}
        RecordKind::EndOfEntries => {
            return Err(Error::EndOfEntries {
                offset,
                signature: Some(signature),
            })
        }
        RecordKind::Unknown => return Err(Error::UnknownRecord { offset, signature }),
    }

    let mut fixed = [0u8; LocalFileHeader::SIZE];
    read_field(reader, &mut fixed, "local file header", offset + 4)?;
    let header: LocalFileHeader = BinaryReader::new(&fixed).read_struct()?;

    let name_offset = offset + LocalFileHeader::RECORD_SIZE as u64;
    let mut name_bytes = vec![0u8; header.file_name_length as usize];
    read_field(reader, &mut name_bytes, "file name", name_offset)?;
    let name = String::from_utf8_lossy(&name_bytes).replace('/', "\\");

    let extra_offset = name_offset + name_bytes.len() as u64;
    let mut extra = vec![0u8; header.extra_field_length as usize];
    read_field(reader, &mut extra, "extra field", extra_offset)?;
    let zip64 = parse_zip64(&extra, extra_offset)?;

    let compressed_size = resolve_size(
        header.compressed_size,
        zip64.map(|z| z.compressed_size),
        &name,
        offset,
    )?;
    let uncompressed_size = resolve_size(
        header.uncompressed_size,
        zip64.map(|z| z.uncompressed_size),
        &name,
        offset,
    )?;
    let uses_zip64 = header.compressed_size == LocalFileHeader::ZIP64_SENTINEL
        || header.uncompressed_size == LocalFileHeader::ZIP64_SENTINEL;

    let payload_offset = extra_offset + extra.len() as u64;
    let available = archive_len.saturating_sub(payload_offset);
    if compressed_size > available {
        return Err(Error::Truncated {
            what: "entry payload",
            offset: payload_offset,
            needed: compressed_size,
            available,
        });
    }

    trace!(
        "{:#x}: {} (method {}, {} -> {} bytes)",
        offset,
        name,
        { header.compression_method },
        compressed_size,
        uncompressed_size
    );

    Ok(ArchiveEntry {
        name,
        signature,
        version_needed: header.version_needed,
        flags: header.flags,
        method: header.compression_method,
        modified: DosDateTime::new(header.mod_date, header.mod_time),
        crc32: header.crc32,
        compressed_size,
        uncompressed_size,
        header_offset: offset,
        payload_offset,
        zip64: uses_zip64,
    })
}

/// Fill `buf` from the stream or report which field was cut short.
fn read_field<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &'static str,
    offset: u64,
) -> Result<()> {
    let got = reader.read_fill(buf)?;
    if got < buf.len() {
        return Err(Error::Truncated {
            what,
            offset,
            needed: buf.len() as u64,
            available: got as u64,
        });
    }
    Ok(())
}

/// Parse the ZIP64 extension when it leads the extra field.
///
/// Trailing extra data (P4K's own 0x5000-series fields) is left unread.
fn parse_zip64(extra: &[u8], offset: u64) -> Result<Option<Zip64Extension>> {
    if extra.len() < 2 || u16::from_le_bytes([extra[0], extra[1]]) != Zip64Extension::ID {
        return Ok(None);
    }
    if extra.len() < Zip64Extension::SIZE {
        return Err(Error::Truncated {
            what: "ZIP64 extra field",
            offset,
            needed: Zip64Extension::SIZE as u64,
            available: extra.len() as u64,
        });
    }

    let record: Zip64Extension = BinaryReader::new(extra).read_struct()?;
    if record.id != Zip64Extension::ID {
        return Err(Error::InvalidExtraFieldId {
            offset,
            expected: Zip64Extension::ID,
            actual: record.id,
        });
    }
    if record.data_size != Zip64Extension::DATA_SIZE {
        return Err(Error::InvalidExtraFieldSize {
            offset,
            expected: Zip64Extension::DATA_SIZE,
            actual: record.data_size,
        });
    }
    Ok(Some(record))
}

/// Pick the 32-bit size unless it holds the ZIP64 sentinel.
fn resolve_size(short: u32, wide: Option<u64>, name: &str, offset: u64) -> Result<u64> {
    if short != LocalFileHeader::ZIP64_SENTINEL {
        return Ok(short as u64);
    }
    wide.ok_or_else(|| Error::MissingZip64Extension {
        offset,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek};

    use super::*;
    use crate::fixtures::{ArchiveWriter, FixtureEntry};
    use crate::zip::signature;

    fn read_first(bytes: Vec<u8>) -> (Result<ArchiveEntry>, u64) {
        let len = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        let result = read_entry_header(&mut cursor, len);
        (result, cursor.stream_position().unwrap())
    }

    #[test]
    fn test_reads_stored_entry_and_stops_at_payload() {
        let bytes = ArchiveWriter::new()
            .stored("Data/Libs/test.xml", b"<a/>")
            .finish();

        let (entry, position) = read_first(bytes);
        let entry = entry.unwrap();

        assert_eq!(entry.name(), r"Data\Libs\test.xml");
        assert_eq!(entry.compressed_size(), 4);
        assert_eq!(entry.uncompressed_size(), 4);
        assert_eq!(entry.header_offset(), 0);
        assert_eq!(entry.payload_offset(), 30 + 18);
        assert_eq!(position, entry.payload_offset());
        assert!(!entry.is_zip64());
    }

    #[test]
    fn test_zip64_sizes_are_authoritative() {
        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::stored("big.bin", vec![7u8; 100]).zip64())
            .finish();

        let (entry, _) = read_first(bytes);
        let entry = entry.unwrap();

        assert!(entry.is_zip64());
        assert_eq!(entry.compressed_size(), 100);
        assert_eq!(entry.uncompressed_size(), 100);
        assert_eq!(entry.payload_offset(), 30 + 7 + 32);
    }

    #[test]
    fn test_missing_zip64_extension_is_fatal() {
        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::stored("big.bin", vec![7u8; 4]).sentinel_without_zip64())
            .finish();

        let (entry, _) = read_first(bytes);
        assert!(matches!(entry, Err(Error::MissingZip64Extension { .. })));
    }

    #[test]
    fn test_zip64_size_field_is_validated() {
        let mut bytes = ArchiveWriter::new()
            .entry(FixtureEntry::stored("a", vec![1u8; 4]).zip64())
            .finish();
        // data_size lives right after the extra field ID.
        let data_size_at = 30 + 1 + 2;
        bytes[data_size_at] = 16;

        let (entry, _) = read_first(bytes);
        assert!(matches!(
            entry,
            Err(Error::InvalidExtraFieldSize {
                expected: 28,
                actual: 16,
                ..
            })
        ));
    }

    #[test]
    fn test_extra_bytes_after_zip64_are_skipped() {
        let bytes = ArchiveWriter::new()
            .entry(
                FixtureEntry::stored("a.xml", b"<a/>".to_vec())
                    .zip64()
                    .trailing_extra(vec![0x00, 0x50, 0x04, 0x00, 1, 2, 3, 4]),
            )
            .finish();

        let (entry, position) = read_first(bytes);
        let entry = entry.unwrap();
        assert_eq!(entry.payload_offset(), 30 + 5 + 32 + 8);
        assert_eq!(position, entry.payload_offset());
    }

    #[test]
    fn test_central_directory_ends_entries() {
        let mut bytes = signature::CENTRAL_DIRECTORY.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 42]);

        let (entry, _) = read_first(bytes);
        let err = entry.unwrap_err();
        assert!(err.is_end_of_entries());
        assert!(!err.is_structural());
    }

    #[test]
    fn test_unknown_signature_is_distinct_from_end() {
        let (entry, _) = read_first(vec![0xEF, 0xBE, 0xAD, 0xDE, 0, 0]);
        match entry {
            Err(Error::UnknownRecord { offset, signature }) => {
                assert_eq!(offset, 0);
                assert_eq!(signature, 0xDEADBEEF);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_stream_is_end_of_entries() {
        let (entry, _) = read_first(Vec::new());
        assert!(matches!(
            entry,
            Err(Error::EndOfEntries {
                signature: None,
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let mut bytes = ArchiveWriter::new().stored("a.xml", b"<a/>").finish();
        bytes.truncate(20);

        let (entry, _) = read_first(bytes);
        assert!(matches!(
            entry,
            Err(Error::Truncated {
                what: "local file header",
                needed: 26,
                available: 16,
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = ArchiveWriter::new()
            .stored("a.xml", b"<root>payload</root>")
            .finish_entries_only();
        bytes.truncate(bytes.len() - 10);

        let (entry, _) = read_first(bytes);
        let err = entry.unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(
            err,
            Error::Truncated {
                what: "entry payload",
                needed: 20,
                available: 10,
                ..
            }
        ));
    }
}
