//! P4K archive entry.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{NaiveDate, NaiveDateTime};

use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// MS-DOS packed date and time, as stored in ZIP headers.
///
/// - Time: bits 0-4 = seconds/2, bits 5-10 = minutes, bits 11-15 = hours
/// - Date: bits 0-4 = day, bits 5-8 = month, bits 9-15 = year-1980
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    /// Packed time word.
    pub time: u16,
    /// Packed date word.
    pub date: u16,
}

impl DosDateTime {
    /// Build from the two header words.
    pub const fn new(date: u16, time: u16) -> Self {
        Self { time, date }
    }

    /// Pack a calendar date and time. Values outside the DOS range are clamped.
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let year = year.clamp(1980, 2107) - 1980;
        let date = (year << 9) | ((month as u16 & 0x0F) << 5) | (day as u16 & 0x1F);
        let time =
            ((hour as u16 & 0x1F) << 11) | ((minute as u16 & 0x3F) << 5) | ((second as u16 / 2) & 0x1F);
        Self { time, date }
    }

    /// Convert to a calendar timestamp.
    ///
    /// Returns None if the packed fields do not form a valid date and time.
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let year = 1980 + (self.date >> 9) as i32;
        let month = ((self.date >> 5) & 0x0F) as u32;
        let day = (self.date & 0x1F) as u32;
        let hour = (self.time >> 11) as u32;
        let minute = ((self.time >> 5) & 0x3F) as u32;
        let second = ((self.time & 0x1F) * 2) as u32;

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }

    /// Convert to a `SystemTime`, interpreting the stamp as UTC.
    pub fn to_system_time(self) -> Option<SystemTime> {
        self.to_naive().map(|dt| dt.and_utc().into())
    }
}

/// An entry (file) within a P4K archive, resolved from its local header.
///
/// This is a read-only view of the header; the payload stays in the archive
/// until [`crate::ArchiveScanner::read`] or [`crate::decode_entry`] pulls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub(crate) name: String,
    pub(crate) signature: u32,
    pub(crate) version_needed: u16,
    pub(crate) flags: u16,
    pub(crate) method: u16,
    pub(crate) modified: DosDateTime,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) header_offset: u64,
    pub(crate) payload_offset: u64,
    pub(crate) zip64: bool,
}

impl ArchiveEntry {
    /// Get the file name/path, with `\` separators.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the record signature the header was read with.
    #[inline]
    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// Get the version needed to extract.
    #[inline]
    pub fn version_needed(&self) -> u16 {
        self.version_needed
    }

    /// Get the general purpose flags.
    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Get the raw compression method tag.
    #[inline]
    pub fn method_tag(&self) -> u16 {
        self.method
    }

    /// Get the compression method, if this reader knows it.
    pub fn compression_method(&self) -> Result<CompressionMethod> {
        CompressionMethod::try_from(self.method).map_err(Error::UnsupportedCompression)
    }

    /// Get the compressed size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the uncompressed size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Get the CRC32 checksum.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Get the offset of the local header (its signature) in the archive.
    #[inline]
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Get the offset of the first payload byte in the archive.
    #[inline]
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    /// Offset of the record boundary following this entry.
    #[inline]
    pub fn next_record_offset(&self) -> u64 {
        self.payload_offset + self.compressed_size
    }

    /// Whether the sizes came from a ZIP64 extra field.
    #[inline]
    pub fn is_zip64(&self) -> bool {
        self.zip64
    }

    /// Get the raw DOS date/time of last modification.
    #[inline]
    pub fn dos_modified(&self) -> DosDateTime {
        self.modified
    }

    /// Get the last modification time.
    ///
    /// Returns None if the DOS datetime is invalid.
    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        self.modified.to_naive()
    }

    /// Get the last modification time as a SystemTime.
    pub fn last_modified_system(&self) -> Option<SystemTime> {
        self.modified.to_system_time()
    }

    /// Get the relative output path for extraction.
    ///
    /// Converts Windows path separators to the platform's native separator.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.name.replace('\\', "/"))
    }

    /// Check if this entry represents a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    /// Get the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            signature: crate::zip::signature::LOCAL_FILE,
            version_needed: 45,
            flags: 0,
            method: 0,
            modified: DosDateTime::default(),
            crc32: 0,
            compressed_size: 10,
            uncompressed_size: 10,
            header_offset: 0,
            payload_offset: 40,
            zip64: false,
        }
    }

    #[test]
    fn test_output_path_normalization() {
        let path = entry(r"Data\Libs\Config\defaultProfile.xml").output_path();
        assert_eq!(path, PathBuf::from("Data/Libs/Config/defaultProfile.xml"));
    }

    #[test]
    fn test_is_dir_and_extension() {
        assert!(entry(r"Data\Localization\").is_dir());
        assert!(!entry(r"Data\global.ini").is_dir());
        assert_eq!(entry("global.ini").extension(), Some("ini"));
    }

    #[test]
    fn test_next_record_offset() {
        assert_eq!(entry("a").next_record_offset(), 50);
    }

    #[test]
    fn test_unknown_method() {
        let mut e = entry("a");
        e.method = 12;
        assert!(matches!(
            e.compression_method(),
            Err(Error::UnsupportedCompression(12))
        ));
    }

    #[test]
    fn test_dos_datetime_round_trip() {
        let stamp = DosDateTime::from_parts(2024, 3, 15, 13, 45, 30);
        let naive = stamp.to_naive().unwrap();
        assert_eq!(naive.to_string(), "2024-03-15 13:45:30");
    }

    #[test]
    fn test_dos_datetime_invalid() {
        // Month 0 is not a date.
        assert!(DosDateTime::new(0, 0).to_naive().is_none());
        assert!(DosDateTime::from_parts(2020, 1, 1, 0, 0, 0)
            .to_system_time()
            .is_some());
    }
}
