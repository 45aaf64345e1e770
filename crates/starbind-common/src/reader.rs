//! Binary reader for bounds-checked parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor over a byte slice that
//! never reads past its end, and [`ReadExt`], which pulls fixed-size records
//! out of `Read` streams while telling a clean end of stream apart from a
//! truncated record.

use std::io::{self, Read};

use zerocopy::FromBytes;

use crate::{Error, Result};

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// Every read is bounds-checked and reports the position it failed at, so
/// callers can surface "needed N bytes at offset X" without extra bookkeeping.
///
/// # Example
///
/// ```
/// use starbind_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_struct::<u32>().unwrap(), 0x04030201);
/// assert_eq!(reader.read_struct::<u16>().unwrap(), 0x0605);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                position: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let position = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            position,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Read `count` consecutive structs.
    ///
    /// The whole run is bounds-checked before anything is allocated, so a
    /// corrupt count cannot trigger a huge reservation.
    pub fn read_array<T: FromBytes>(&mut self, count: usize) -> Result<Vec<T>> {
        let size = std::mem::size_of::<T>();
        let total = count.checked_mul(size).ok_or(Error::UnexpectedEof {
            position: self.position,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.peek_bytes(total)?;

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_struct::<T>()?);
        }
        Ok(items)
    }
}

/// Extension trait for pulling fixed-size records out of streams.
pub trait ReadExt: Read {
    /// Fill `buf` as far as the stream allows.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// when the stream ended. Interrupted reads are retried.
    fn read_fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}
