//! Stitches I/O chunks into one logical byte stream with primitive decoders.

use std::sync::Arc;

use bytes::Bytes;
use rcscan_common::{Result, error::Error, verify_data};
use rcscan_format::vint;
use rcscan_io::{Cancellation, ChunkDelivery, ChunkSource, IoChunk};

use crate::context::ResourceSink;

/// A contiguous byte interval `[offset, offset + len)` of one file, assigned
/// externally as a unit of parsing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub offset: u64,
    pub len: u64,
}

impl ScanRange {
    pub fn new(offset: u64, len: u64) -> ScanRange {
        ScanRange { offset, len }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// A cursor over one logical byte range, fed by chunks from a [`ChunkSource`].
///
/// The unread bytes of the stream are always, in order: the unread tail of
/// the boundary buffer, then the unread tail of the current chunk, then the
/// chunks not yet fetched. `request` serves a span without copying whenever it
/// lies entirely within one of the first two; a span straddling them is
/// assembled in the boundary buffer.
///
/// Not thread safe: exactly one decoding thread calls into the stream. Slices
/// returned by `request` stay valid until the next call on the stream, which
/// the borrow checker enforces.
///
/// After the assigned range is exhausted the stream keeps reading, in
/// `read_past_size` steps, until true end of file: the last row group of a
/// range may straddle into the next one.
pub struct ByteStream {
    source: Arc<dyn ChunkSource>,
    cancel: Cancellation,
    range: ScanRange,
    read_past_size: usize,
    /// Bytes released to the caller by non-peek requests. Peek never advances
    /// this.
    total_consumed: u64,
    /// Absolute file offset of the next byte to fetch from the source.
    next_fetch_offset: u64,
    /// Set once the source reports the assigned range fully delivered.
    range_delivered: bool,
    /// Set once a read past the range returned no bytes.
    at_eof: bool,
    chunk: Option<IoChunk>,
    chunk_pos: usize,
    /// Bytes copied out of one or more chunks when a request straddled a
    /// chunk boundary. Logically precedes the current chunk.
    boundary: Vec<u8>,
    boundary_pos: usize,
    /// Fully consumed chunks awaiting transfer to the output or return to the
    /// source. Disposal trails consumption so the output sees buffers in the
    /// same order as the rows that reference them.
    completed: Vec<IoChunk>,
    /// When true the output never references chunk memory and consumed chunks
    /// go straight back to the source.
    compact_data: bool,
}

impl ByteStream {
    /// Default size of a single read past the end of the scan range. Reading
    /// past the range is likely remote, so requests are kept few and small.
    pub const DEFAULT_READ_PAST_SIZE: usize = 64 * 1024;

    pub fn new(source: Arc<dyn ChunkSource>, cancel: Cancellation, range: ScanRange) -> ByteStream {
        ByteStream {
            source,
            cancel,
            range,
            read_past_size: Self::DEFAULT_READ_PAST_SIZE,
            total_consumed: 0,
            next_fetch_offset: range.offset,
            range_delivered: false,
            at_eof: false,
            chunk: None,
            chunk_pos: 0,
            boundary: Vec::new(),
            boundary_pos: 0,
            completed: Vec::new(),
            compact_data: false,
        }
    }

    pub fn scan_range(&self) -> ScanRange {
        self.range
    }

    /// Overrides the read-past step size; scanners that know more about the
    /// file may tune this.
    pub fn set_read_past_size(&mut self, size: usize) {
        self.read_past_size = size.max(1);
    }

    /// Declares whether the output copies field bytes out of chunk memory.
    /// If it does, consumed chunks are returned to the source immediately
    /// instead of being attached to the output.
    pub fn set_compact_data(&mut self, compact: bool) {
        self.compact_data = compact;
    }

    /// Total number of bytes released to the caller.
    pub fn total_consumed(&self) -> u64 {
        self.total_consumed
    }

    /// Bytes left in the assigned range; negative once reads have gone past
    /// the range end.
    pub fn bytes_left(&self) -> i64 {
        self.range.len as i64 - self.total_consumed as i64
    }

    /// True once every byte of the assigned range has been released.
    pub fn end_of_range(&self) -> bool {
        self.total_consumed >= self.range.len
    }

    /// True once every byte of the file has been released.
    pub fn eof(&self) -> bool {
        self.file_offset() >= self.source.file_size()
    }

    /// Current offset in the file.
    pub fn file_offset(&self) -> u64 {
        self.range.offset + self.total_consumed
    }

    /// Returns up to `len` bytes of the stream.
    ///
    /// With `peek` set the stream position does not move and repeated calls
    /// return the same bytes. Fewer than `len` bytes are returned only at end
    /// of file; that is not an error. Blocks while the next chunk of the
    /// range is still in flight.
    pub fn request(&mut self, len: usize, peek: bool) -> Result<&[u8]> {
        self.reclaim_boundary();
        if len == 0 {
            return Ok(&[]);
        }
        if self.boundary_remaining() == 0 {
            if self.chunk_remaining() == 0 {
                self.fetch_chunk()?;
            }
            if len <= self.chunk_remaining() {
                let start = self.chunk_pos;
                if !peek {
                    self.chunk_pos += len;
                    self.total_consumed += len as u64;
                }
                let chunk = self.chunk.as_ref().expect("current chunk");
                return Ok(&chunk.data()[start..start + len]);
            }
        } else if len <= self.boundary_remaining() {
            let start = self.boundary_pos;
            if !peek {
                self.boundary_pos += len;
                self.total_consumed += len as u64;
            }
            return Ok(&self.boundary[start..start + len]);
        }
        self.request_straddling(len, peek)
    }

    /// Slow path: the span straddles the boundary buffer, the current chunk,
    /// or a chunk boundary. Bytes are progressively copied into the boundary
    /// buffer until the request is satisfiable or the file ends.
    fn request_straddling(&mut self, len: usize, peek: bool) -> Result<&[u8]> {
        if self.boundary_pos > 0 {
            self.boundary.drain(..self.boundary_pos);
            self.boundary_pos = 0;
        }
        while self.boundary.len() < len {
            if self.chunk_remaining() == 0 && !self.fetch_chunk()? {
                break;
            }
            let take = (len - self.boundary.len()).min(self.chunk_remaining());
            let chunk = self.chunk.as_ref().expect("current chunk");
            self.boundary
                .extend_from_slice(&chunk.data()[self.chunk_pos..self.chunk_pos + take]);
            self.chunk_pos += take;
        }
        let actual = len.min(self.boundary.len());
        if !peek {
            self.boundary_pos = actual;
            self.total_consumed += actual as u64;
        }
        Ok(&self.boundary[..actual])
    }

    /// Discards `len` bytes without copying them through the boundary buffer.
    pub fn skip_bytes(&mut self, len: usize) -> Result<()> {
        self.reclaim_boundary();
        let declared = len as u64;
        let mut left = len;
        let take = left.min(self.boundary_remaining());
        self.boundary_pos += take;
        self.total_consumed += take as u64;
        left -= take;
        while left > 0 {
            if self.chunk_remaining() == 0 && !self.fetch_chunk()? {
                return Err(Error::truncated("skip", declared, declared - left as u64));
            }
            let take = left.min(self.chunk_remaining());
            self.chunk_pos += take;
            self.total_consumed += take as u64;
            left -= take;
        }
        Ok(())
    }

    /// Reads exactly `len` bytes, failing with a truncation error naming
    /// `element` if the file ends first.
    pub fn read_bytes(&mut self, len: usize, element: &str) -> Result<&[u8]> {
        // Split borrow dance: compute the shortfall before returning the
        // slice so the error path does not borrow the stream.
        let actual = {
            let bytes = self.request(len, false)?;
            bytes.len()
        };
        if actual < len {
            return Err(Error::truncated(element, len as u64, actual as u64));
        }
        // The bytes just consumed are still in place; re-borrow them.
        Ok(self.last_returned(len))
    }

    /// Reads a fixed 4-byte big-endian integer.
    pub fn read_int(&mut self) -> Result<i32> {
        let b = self.read_bytes(4, "int")?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a single-byte boolean.
    pub fn read_bool(&mut self) -> Result<bool> {
        let b = self.read_bytes(1, "bool")?;
        Ok(b[0] != 0)
    }

    /// Reads a variable-length 64-bit integer (7 bits per byte, high bit =
    /// continuation).
    pub fn read_var_long(&mut self) -> Result<i64> {
        let mut tmp = [0u8; vint::MAX_VINT_LEN];
        let peeked = self.request(vint::MAX_VINT_LEN, true)?;
        let avail = peeked.len();
        tmp[..avail].copy_from_slice(peeked);
        let mut pos = 0;
        let value = vint::read_var_long_at(&tmp[..avail], &mut pos)?;
        self.request(pos, false)?;
        Ok(value)
    }

    /// Reads a variable-length integer that must fit in 32 bits.
    pub fn read_var_int(&mut self) -> Result<i32> {
        let value = self.read_var_long()?;
        i32::try_from(value)
            .map_err(|_| Error::invalid_format("varint", format!("value {value} exceeds 32 bits")))
    }

    /// Reads a zigzag-folded variable-length integer.
    pub fn read_zigzag_long(&mut self) -> Result<i64> {
        let folded = self.read_var_long()?;
        Ok(vint::unfold_zigzag(folded))
    }

    /// Reads a length-prefixed UTF-8 text value into an owned buffer.
    pub fn read_text(&mut self) -> Result<Vec<u8>> {
        let len = self.read_var_long()?;
        verify_data!(text_length, len >= 0);
        let bytes = self.read_bytes(len as usize, "text")?;
        Ok(bytes.to_vec())
    }

    /// Skips a length-prefixed text value.
    pub fn skip_text(&mut self) -> Result<()> {
        let len = self.read_var_long()?;
        verify_data!(text_length, len >= 0);
        self.skip_bytes(len as usize)
    }

    /// Transfers fully consumed chunks to `sink` in consumption order. With
    /// `done` set, everything still held — the current chunk and the boundary
    /// buffer included — is force-attached so nothing leaks, even on the
    /// error path.
    pub fn attach_completed_resources(&mut self, sink: &mut dyn ResourceSink, done: bool) {
        for chunk in self.completed.drain(..) {
            sink.attach_chunk(chunk);
        }
        if done {
            if let Some(chunk) = self.chunk.take() {
                self.chunk_pos = 0;
                sink.attach_chunk(chunk);
            }
            if !self.boundary.is_empty() {
                let offset = self.file_offset().saturating_sub(self.boundary_pos as u64);
                let data = Bytes::from(std::mem::take(&mut self.boundary));
                self.boundary_pos = 0;
                sink.attach_chunk(IoChunk::new(offset, data));
            }
        }
    }

    /// Returns every held resource to the source and abandons the range.
    /// Idempotent; safe after a partial or failed decode.
    pub fn close(&mut self) {
        for chunk in self.completed.drain(..) {
            self.source.recycle(chunk);
        }
        if let Some(chunk) = self.chunk.take() {
            self.chunk_pos = 0;
            self.source.recycle(chunk);
        }
        self.boundary.clear();
        self.boundary_pos = 0;
        self.source.close();
    }

    fn chunk_remaining(&self) -> usize {
        self.chunk
            .as_ref()
            .map_or(0, |chunk| chunk.len() - self.chunk_pos)
    }

    fn boundary_remaining(&self) -> usize {
        self.boundary.len() - self.boundary_pos
    }

    /// Resets the boundary buffer once its content is fully consumed. Runs at
    /// the start of the next call, after the previously returned borrow died.
    fn reclaim_boundary(&mut self) {
        if self.boundary_pos > 0 && self.boundary_pos == self.boundary.len() {
            self.boundary.clear();
            self.boundary_pos = 0;
        }
    }

    /// Re-borrows the `len` bytes consumed by the immediately preceding
    /// `request`.
    fn last_returned(&self, len: usize) -> &[u8] {
        if self.boundary_pos >= len && self.boundary_pos <= self.boundary.len() {
            &self.boundary[self.boundary_pos - len..self.boundary_pos]
        } else {
            let chunk = self.chunk.as_ref().expect("current chunk");
            &chunk.data()[self.chunk_pos - len..self.chunk_pos]
        }
    }

    /// Retires the exhausted current chunk and installs the next one.
    ///
    /// Blocks while the next in-range chunk is in flight. Once the range is
    /// fully delivered, continues with bounded synchronous reads past the
    /// range end. Returns `false` at true end of file.
    fn fetch_chunk(&mut self) -> Result<bool> {
        if let Some(chunk) = self.chunk.take() {
            debug_assert_eq!(self.chunk_pos, chunk.len());
            self.retire_chunk(chunk);
        }
        self.chunk_pos = 0;
        if self.at_eof {
            return Ok(false);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        while !self.range_delivered {
            match self.source.wait_chunk(&self.cancel)? {
                ChunkDelivery::Chunk(chunk) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    verify_data!(chunk_offset, chunk.offset() == self.next_fetch_offset);
                    self.next_fetch_offset = chunk.end();
                    self.chunk = Some(chunk);
                    return Ok(true);
                }
                ChunkDelivery::RangeDone => {
                    self.range_delivered = true;
                    log::debug!(
                        "scan range {}..{} delivered; further reads go past the range end",
                        self.range.offset,
                        self.range.end()
                    );
                }
            }
        }
        let start = self.next_fetch_offset;
        match self.source.read_past(start..start + self.read_past_size as u64)? {
            Some(chunk) => {
                self.next_fetch_offset = chunk.end();
                self.chunk = Some(chunk);
                Ok(true)
            }
            None => {
                self.at_eof = true;
                Ok(false)
            }
        }
    }

    fn retire_chunk(&mut self, chunk: IoChunk) {
        if self.compact_data {
            self.source.recycle(chunk);
        } else {
            self.completed.push(chunk);
        }
    }
}
