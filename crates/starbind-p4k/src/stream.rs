//! Streaming decompression.
//!
//! A [`StreamEngine`] is a stateful decoder that is handed one slice of
//! compressed input and one output buffer per call, and reports how much of
//! each it used. [`StreamDecoder`] owns the input buffer, refills it from a
//! `Read` source and pumps the engine until the source is exhausted and a
//! call makes no progress.

use std::io::{self, Read};

use starbind_common::ReadExt;

use crate::zip::CompressionMethod;
use crate::{Error, Result};

/// Size of the compressed input buffer.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Outcome of one engine call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step {
    /// Input bytes consumed.
    pub consumed: usize,
    /// Output bytes produced.
    pub produced: usize,
    /// The engine is at a frame boundary with nothing left to flush.
    pub finished: bool,
}

/// A stateful decompression engine.
pub trait StreamEngine {
    /// The method this engine decodes.
    fn method(&self) -> CompressionMethod;

    /// Decode from `input` into `output`.
    ///
    /// `input` may be empty, in which case the engine only flushes output it
    /// is still holding.
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step>;
}

impl<E: StreamEngine + ?Sized> StreamEngine for Box<E> {
    fn method(&self) -> CompressionMethod {
        (**self).method()
    }

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        (**self).step(input, output)
    }
}

/// Passthrough engine for stored entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreEngine;

impl StreamEngine for StoreEngine {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Store
    }

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        Ok(Step {
            consumed: n,
            produced: n,
            finished: true,
        })
    }
}

/// Zstandard engine backed by libzstd's streaming decoder.
#[cfg(feature = "zstd")]
pub struct ZstdEngine {
    decoder: zstd::stream::raw::Decoder<'static>,
    frame_done: bool,
}

#[cfg(feature = "zstd")]
impl ZstdEngine {
    /// Initialize a fresh decode context.
    pub fn new() -> Result<Self> {
        let decoder = zstd::stream::raw::Decoder::new().map_err(|e| Error::Decompression {
            method: CompressionMethod::Zstd,
            message: e.to_string(),
        })?;
        Ok(Self {
            decoder,
            frame_done: false,
        })
    }
}

#[cfg(feature = "zstd")]
impl StreamEngine for ZstdEngine {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        use zstd::stream::raw::{InBuffer, Operation, OutBuffer};

        // Past a frame end libzstd would start waiting for the next header.
        if input.is_empty() && self.frame_done {
            return Ok(Step {
                consumed: 0,
                produced: 0,
                finished: true,
            });
        }

        let mut src = InBuffer::around(input);
        let mut dst = OutBuffer::around(output);
        // The hint is 0 once a frame is fully decoded and flushed.
        let hint = self
            .decoder
            .run(&mut src, &mut dst)
            .map_err(|e| Error::Decompression {
                method: CompressionMethod::Zstd,
                message: e.to_string(),
            })?;

        self.frame_done = hint == 0;
        Ok(Step {
            consumed: src.pos(),
            produced: dst.pos(),
            finished: self.frame_done,
        })
    }
}

/// Raw DEFLATE engine.
#[cfg(feature = "deflate")]
pub struct DeflateEngine {
    inner: flate2::Decompress,
    finished: bool,
}

#[cfg(feature = "deflate")]
impl DeflateEngine {
    /// Initialize a raw (headerless) inflater.
    pub fn new() -> Self {
        Self {
            inner: flate2::Decompress::new(false),
            finished: false,
        }
    }
}

#[cfg(feature = "deflate")]
impl Default for DeflateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "deflate")]
impl StreamEngine for DeflateEngine {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        if self.finished {
            return Ok(Step {
                consumed: 0,
                produced: 0,
                finished: true,
            });
        }

        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, output, flate2::FlushDecompress::None)
            .map_err(|e| Error::Decompression {
                method: CompressionMethod::Deflate,
                message: e.to_string(),
            })?;
        self.finished = status == flate2::Status::StreamEnd;

        Ok(Step {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            finished: self.finished,
        })
    }
}

/// Pumps a compressed `Read` source through a [`StreamEngine`].
///
/// Implements `Read` itself, so it can be handed to anything that consumes a
/// byte stream. [`StreamDecoder::decode_to_end`] is the typed-error path.
pub struct StreamDecoder<R, E> {
    source: R,
    engine: E,
    input: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    source_done: bool,
    done: bool,
    produced: u64,
}

impl<R: Read, E: StreamEngine> StreamDecoder<R, E> {
    /// Create a decoder with the default chunk size.
    pub fn new(source: R, engine: E) -> Self {
        Self::with_chunk_size(source, engine, DEFAULT_CHUNK_SIZE)
    }

    /// Create a decoder that refills its input `chunk_size` bytes at a time.
    pub fn with_chunk_size(source: R, engine: E, chunk_size: usize) -> Self {
        Self {
            source,
            engine,
            input: vec![0u8; chunk_size.max(1)],
            in_pos: 0,
            in_len: 0,
            source_done: false,
            done: false,
            produced: 0,
        }
    }

    /// Total bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.produced
    }

    /// Whether the engine has signalled completion.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Give back the source.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Decode into `out`, returning how many bytes were written.
    ///
    /// Returns 0 only once the stream is complete.
    pub fn decode(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.done || out.is_empty() {
            return Ok(0);
        }

        loop {
            if self.in_pos == self.in_len && !self.source_done {
                let got = self.source.read_fill(&mut self.input)?;
                self.in_pos = 0;
                self.in_len = got;
                self.source_done = got < self.input.len();
            }

            let step = self
                .engine
                .step(&self.input[self.in_pos..self.in_len], out)?;
            self.in_pos += step.consumed;

            if step.produced > 0 {
                self.produced += step.produced as u64;
                return Ok(step.produced);
            }
            if step.consumed > 0 {
                continue;
            }

            let input_exhausted = self.source_done && self.in_pos == self.in_len;
            if input_exhausted {
                if !step.finished {
                    return Err(Error::TruncatedStream {
                        method: self.engine.method(),
                        produced: self.produced,
                    });
                }
                self.done = true;
                return Ok(0);
            }
            if self.in_pos < self.in_len {
                if step.finished {
                    // Trailing bytes after the end of the stream.
                    self.done = true;
                    return Ok(0);
                }
                return Err(Error::Decompression {
                    method: self.engine.method(),
                    message: format!(
                        "engine stalled with {} input bytes pending after {} output bytes",
                        self.in_len - self.in_pos,
                        self.produced
                    ),
                });
            }
        }
    }

    /// Decode the whole stream, appending to `out`.
    pub fn decode_to_end(&mut self, out: &mut Vec<u8>) -> Result<u64> {
        self.decode_with_limit(out, u64::MAX)
    }

    /// Decode the whole stream, appending to `out`, but fail with
    /// [`Error::OutputLimit`] as soon as more than `limit` bytes come out.
    ///
    /// At most `limit + 1` bytes are appended before the error.
    pub fn decode_with_limit(&mut self, out: &mut Vec<u8>, limit: u64) -> Result<u64> {
        let start = self.produced;
        let mut chunk = vec![0u8; self.input.len()];
        loop {
            let room = limit
                .saturating_sub(self.produced - start)
                .saturating_add(1);
            let want = usize::try_from(room).map_or(chunk.len(), |room| room.min(chunk.len()));
            let n = self.decode(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            if self.produced - start > limit {
                return Err(Error::OutputLimit {
                    method: self.engine.method(),
                    limit,
                });
            }
        }
        Ok(self.produced - start)
    }
}

impl<R: Read, E: StreamEngine> Read for StreamDecoder<R, E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decode(buf).map_err(|e| match e {
            Error::Io(io) => io,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        })
    }
}
