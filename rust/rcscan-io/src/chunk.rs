//! Ownership-transferring I/O chunks and the decoder-facing chunk source.

use std::ops::Range;

use bytes::Bytes;
use rcscan_common::Result;

use crate::cancel::Cancellation;

/// A block of bytes covering a sub-range of a scan range.
///
/// A chunk has exactly one owner at a time: the I/O subsystem that produced
/// it, the byte stream consuming it, or the output batch that holds zero-copy
/// references into it. Ownership moves only at explicit points — delivery via
/// [`ChunkSource::wait_chunk`], attachment to an output batch, or return via
/// [`ChunkSource::recycle`] — never implicitly.
#[derive(Debug)]
pub struct IoChunk {
    offset: u64,
    data: Bytes,
}

impl IoChunk {
    pub fn new(offset: u64, data: Bytes) -> IoChunk {
        IoChunk { offset, data }
    }

    /// File offset of the first byte in this chunk.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// File offset one past the last byte in this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// Outcome of waiting for the next in-range chunk.
pub enum ChunkDelivery {
    /// The next chunk of the scan range, in increasing offset order.
    Chunk(IoChunk),
    /// All chunks of the assigned scan range have been delivered.
    RangeDone,
}

/// The decoder-facing face of the I/O subsystem for one byte range.
///
/// `wait_chunk` is the only blocking point of the entire decode path; it
/// parks the consumer thread until the producer delivers, the range is
/// exhausted, or cancellation is observed.
pub trait ChunkSource: Send + Sync {
    /// Total size of the underlying file, used for end-of-file detection.
    fn file_size(&self) -> u64;

    /// Blocks until the next in-range chunk is available.
    fn wait_chunk(&self, cancel: &Cancellation) -> Result<ChunkDelivery>;

    /// Synchronously reads bytes past the end of the assigned range.
    ///
    /// The last logical record of a range may straddle into the next range,
    /// so the stream keeps reading after range exhaustion. Returns `None` at
    /// end of file.
    fn read_past(&self, range: Range<u64>) -> Result<Option<IoChunk>>;

    /// Returns a chunk the consumer no longer references to the I/O
    /// subsystem.
    fn recycle(&self, chunk: IoChunk) {
        drop(chunk);
    }

    /// Tells the source the consumer has abandoned the range; any undelivered
    /// chunks can be discarded. Idempotent.
    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_bounds() {
        let chunk = IoChunk::new(100, Bytes::from_static(b"abcdef"));
        assert_eq!(chunk.offset(), 100);
        assert_eq!(chunk.end(), 106);
        assert_eq!(chunk.len(), 6);
        assert!(!chunk.is_empty());
        assert_eq!(chunk.into_data().as_ref(), b"abcdef");
    }
}
