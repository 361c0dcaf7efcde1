//! Shared state for one scan: streams, cancellation, resource transfer.

use std::sync::Arc;

use rcscan_io::{Cancellation, ChunkSource, IoChunk};

use crate::byte_stream::{ByteStream, ScanRange};

/// Receives ownership of I/O buffers that carry bytes referenced by emitted
/// rows. Implemented by output batches; buffers stay alive as long as the
/// batch does.
pub trait ResourceSink {
    fn attach_chunk(&mut self, chunk: IoChunk);
}

/// Per-scan-range state shared between the scanner and its byte streams.
///
/// One context serves one assigned range. The controller thread touches only
/// the [`Cancellation`] handle and `close`; everything else belongs to the
/// single consumer thread driving the decode.
pub struct ScanContext {
    streams: Vec<ByteStream>,
    cancel: Cancellation,
    closed: bool,
}

impl ScanContext {
    pub fn new(cancel: Cancellation) -> ScanContext {
        ScanContext {
            streams: Vec::new(),
            cancel,
            closed: false,
        }
    }

    /// Registers a byte stream over `range` fed by `source`, returning its
    /// index.
    pub fn add_stream(&mut self, source: Arc<dyn ChunkSource>, range: ScanRange) -> usize {
        self.streams
            .push(ByteStream::new(source, self.cancel.clone(), range));
        self.streams.len() - 1
    }

    pub fn stream(&mut self, index: usize) -> &mut ByteStream {
        &mut self.streams[index]
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Hands consumed I/O buffers from every stream to `sink` in consumption
    /// order. With `done` set, partially consumed buffers are handed over too.
    pub fn attach_completed_resources(&mut self, sink: &mut dyn ResourceSink, done: bool) {
        for stream in &mut self.streams {
            stream.attach_completed_resources(sink, done);
        }
    }

    /// Releases every stream and its queued chunks. Idempotent; called by the
    /// controller or on drop of the scan.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::debug!("closing scan context with {} stream(s)", self.streams.len());
        for stream in &mut self.streams {
            stream.close();
        }
    }
}

impl Drop for ScanContext {
    fn drop(&mut self) {
        self.close();
    }
}
