//! Compression method dispatch.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::entry::ArchiveEntry;
use crate::stream::{StoreEngine, StreamDecoder};
use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// Upper bound on the output buffer reserved up front from a declared size.
const MAX_PREALLOCATION: u64 = 256 * 1024 * 1024;

impl CompressionMethod {
    /// Resolve a header tag to a method whose decoder is present.
    ///
    /// Unknown tags are [`Error::UnsupportedCompression`]; known methods
    /// compiled out of this build are [`Error::EngineUnavailable`].
    pub fn for_tag(tag: u16) -> Result<Self> {
        let method = Self::try_from(tag).map_err(Error::UnsupportedCompression)?;
        if !method.is_available() {
            return Err(Error::EngineUnavailable { method });
        }
        Ok(method)
    }

    /// Decode a compressed stream of exactly one entry.
    ///
    /// Output is capped at `size_limit` bytes; a stream that would produce
    /// more fails with [`Error::OutputLimit`] without being inflated further.
    pub fn decode<R: Read>(self, source: R, size_limit: u64) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(size_limit.min(MAX_PREALLOCATION) as usize);
        match self {
            Self::Store => decode_store(source, &mut output, size_limit)?,
            Self::Deflate => decode_deflate(source, &mut output, size_limit)?,
            Self::Zstd => decode_zstd(source, &mut output, size_limit)?,
        };
        Ok(output)
    }
}

fn decode_store<R: Read>(source: R, output: &mut Vec<u8>, limit: u64) -> Result<u64> {
    StreamDecoder::new(source, StoreEngine).decode_with_limit(output, limit)
}

#[cfg(feature = "deflate")]
fn decode_deflate<R: Read>(source: R, output: &mut Vec<u8>, limit: u64) -> Result<u64> {
    StreamDecoder::new(source, crate::stream::DeflateEngine::new())
        .decode_with_limit(output, limit)
}

#[cfg(not(feature = "deflate"))]
fn decode_deflate<R: Read>(_source: R, _output: &mut Vec<u8>, _limit: u64) -> Result<u64> {
    Err(Error::EngineUnavailable {
        method: CompressionMethod::Deflate,
    })
}

#[cfg(feature = "zstd")]
fn decode_zstd<R: Read>(source: R, output: &mut Vec<u8>, limit: u64) -> Result<u64> {
    StreamDecoder::new(source, crate::stream::ZstdEngine::new()?)
        .decode_with_limit(output, limit)
}

#[cfg(not(feature = "zstd"))]
fn decode_zstd<R: Read>(_source: R, _output: &mut Vec<u8>, _limit: u64) -> Result<u64> {
    Err(Error::EngineUnavailable {
        method: CompressionMethod::Zstd,
    })
}

/// Seek to an entry's payload and decode it.
///
/// Reads exactly `compressed_size` bytes and fails with
/// [`Error::SizeMismatch`] if the output differs from the declared
/// uncompressed size. Decoding stops one byte past the declared size.
pub fn decode_entry<R: Read + Seek>(reader: &mut R, entry: &ArchiveEntry) -> Result<Vec<u8>> {
    let method = CompressionMethod::for_tag(entry.method_tag())?;
    if entry.compressed_size() == 0 && entry.uncompressed_size() == 0 {
        return Ok(Vec::new());
    }

    reader.seek(SeekFrom::Start(entry.payload_offset()))?;
    let source = reader.by_ref().take(entry.compressed_size());
    let data = match method.decode(source, entry.uncompressed_size()) {
        Ok(data) => data,
        Err(Error::OutputLimit { limit, .. }) => {
            return Err(Error::SizeMismatch {
                name: entry.name().to_string(),
                declared: entry.uncompressed_size(),
                actual: limit.saturating_add(1),
            });
        }
        Err(e) => return Err(e),
    };

    if data.len() as u64 != entry.uncompressed_size() {
        return Err(Error::SizeMismatch {
            name: entry.name().to_string(),
            declared: entry.uncompressed_size(),
            actual: data.len() as u64,
        });
    }

    debug!(
        "decoded {} ({:?}, {} -> {} bytes)",
        entry.name(),
        method,
        entry.compressed_size(),
        data.len()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::fixtures::{ArchiveWriter, FixtureEntry};
    use crate::header::read_entry_header;

    fn first_entry(bytes: &[u8]) -> (Cursor<&[u8]>, ArchiveEntry) {
        let mut cursor = Cursor::new(bytes);
        let entry = read_entry_header(&mut cursor, bytes.len() as u64).unwrap();
        (cursor, entry)
    }

    #[test]
    fn test_store_is_identity() {
        let payload = b"<ActionMaps version=\"1\"/>".to_vec();
        let bytes = ArchiveWriter::new().stored("p.xml", &payload).finish();

        let (mut cursor, entry) = first_entry(&bytes);
        assert_eq!(decode_entry(&mut cursor, &entry).unwrap(), payload);
    }

    #[test]
    fn test_empty_entry() {
        let bytes = ArchiveWriter::new().stored("empty", b"").finish();
        let (mut cursor, entry) = first_entry(&bytes);
        assert!(decode_entry(&mut cursor, &entry).unwrap().is_empty());
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_entry() {
        let plain = b"keybinding ".repeat(500);
        let compressed = zstd::encode_all(&plain[..], 3).unwrap();
        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::new("p.xml", 100, compressed, plain.len() as u64).zip64())
            .stored("after.bin", b"tail")
            .finish();

        let (mut cursor, entry) = first_entry(&bytes);
        assert_eq!(decode_entry(&mut cursor, &entry).unwrap(), plain);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_declared_size_mismatch() {
        let plain = b"0123456789".to_vec();
        let compressed = zstd::encode_all(&plain[..], 3).unwrap();
        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::new("p.xml", 100, compressed, 11))
            .finish();

        let (mut cursor, entry) = first_entry(&bytes);
        let err = decode_entry(&mut cursor, &entry).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                declared: 11,
                actual: 10,
                ..
            }
        ));
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_oversized_stream_stops_at_declared_size() {
        let plain = vec![0u8; 64 * 1024 * 1024];
        let compressed = zstd::encode_all(&plain[..], 3).unwrap();
        drop(plain);

        let err = CompressionMethod::Zstd
            .decode(&compressed[..], 16)
            .unwrap_err();
        assert!(matches!(err, Error::OutputLimit { limit: 16, .. }));

        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::new("bomb.xml", 100, compressed, 16))
            .finish();
        let (mut cursor, entry) = first_entry(&bytes);
        let err = decode_entry(&mut cursor, &entry).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                declared: 16,
                actual: 17,
                ..
            }
        ));
    }

    #[test]
    fn test_stored_entry_longer_than_declared() {
        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::new("x.bin", 0, b"0123456789".to_vec(), 4))
            .finish();

        let (mut cursor, entry) = first_entry(&bytes);
        let err = decode_entry(&mut cursor, &entry).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                declared: 4,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let bytes = ArchiveWriter::new()
            .entry(FixtureEntry::new("x.bin", 14, vec![1, 2, 3], 3))
            .finish();

        let (mut cursor, entry) = first_entry(&bytes);
        let err = decode_entry(&mut cursor, &entry).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCompression(14)));
        assert!(err.is_codec());
    }

    #[test]
    fn test_for_tag() {
        assert_eq!(
            CompressionMethod::for_tag(0).unwrap(),
            CompressionMethod::Store
        );
        assert!(matches!(
            CompressionMethod::for_tag(99),
            Err(Error::UnsupportedCompression(99))
        ));
        #[cfg(not(feature = "zstd"))]
        assert!(matches!(
            CompressionMethod::for_tag(100),
            Err(Error::EngineUnavailable { .. })
        ));
    }
}
