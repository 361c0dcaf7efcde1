//! Background producer that fills a chunk queue from a positional reader.

use std::{ops::Range, sync::Arc};

use rcscan_common::{Result, error::Error};

use crate::{
    ReadAt,
    cancel::Cancellation,
    chunk::{ChunkDelivery, ChunkSource, IoChunk},
    io_pool::IoPool,
    queue::ChunkQueue,
};

/// A [`ChunkSource`] backed by a queue that a background job fills from a
/// [`ReadAt`] reader.
///
/// In-range bytes are delivered asynchronously through the queue; reads past
/// the assigned range go synchronously to the reader, since they are rare and
/// small by construction.
pub struct QueuedChunkSource {
    queue: Arc<ChunkQueue>,
    reader: Arc<dyn ReadAt>,
    file_size: u64,
}

impl QueuedChunkSource {
    /// Default size of a single background fetch.
    pub const DEFAULT_FETCH_SIZE: usize = 128 * 1024;

    /// Spawns a background job on the global [`IoPool`] that reads `range`
    /// from `reader` in `fetch_size` chunks and queues them in offset order.
    pub fn spawn(
        reader: Arc<dyn ReadAt>,
        range: Range<u64>,
        fetch_size: usize,
    ) -> Result<Arc<QueuedChunkSource>> {
        let file_size = reader
            .size()
            .map_err(|e| Error::io("chunk source size", e))?;
        let queue = Arc::new(ChunkQueue::new(ChunkQueue::DEFAULT_CAPACITY));
        let source = Arc::new(QueuedChunkSource {
            queue: queue.clone(),
            reader: reader.clone(),
            file_size,
        });
        let end = range.end.min(file_size);
        let fetch_size = fetch_size.max(1);
        IoPool::get().spawn(move || fill_queue(reader, range.start..end, fetch_size, queue));
        Ok(source)
    }

    /// Wraps an externally managed queue; the caller is the producer.
    pub fn with_queue(
        reader: Arc<dyn ReadAt>,
        file_size: u64,
        queue: Arc<ChunkQueue>,
    ) -> Arc<QueuedChunkSource> {
        Arc::new(QueuedChunkSource {
            queue,
            reader,
            file_size,
        })
    }

    pub fn queue(&self) -> &Arc<ChunkQueue> {
        &self.queue
    }
}

fn fill_queue(reader: Arc<dyn ReadAt>, range: Range<u64>, fetch_size: usize, queue: Arc<ChunkQueue>) {
    let mut pos = range.start;
    while pos < range.end {
        let end = range.end.min(pos + fetch_size as u64);
        match reader.read_at(pos..end) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    break;
                }
                let next = pos + bytes.len() as u64;
                queue.push(IoChunk::new(pos, bytes));
                pos = next;
            }
            Err(e) => {
                log::warn!("background fetch of {pos}..{end} failed: {e}");
                queue.fail(Error::io(format!("read of {pos}..{end}"), e));
                return;
            }
        }
    }
    queue.finish();
}

impl ChunkSource for QueuedChunkSource {
    fn file_size(&self) -> u64 {
        self.file_size
    }

    fn wait_chunk(&self, cancel: &Cancellation) -> Result<ChunkDelivery> {
        match self.queue.pop(cancel)? {
            Some(chunk) => Ok(ChunkDelivery::Chunk(chunk)),
            None => Ok(ChunkDelivery::RangeDone),
        }
    }

    fn read_past(&self, range: Range<u64>) -> Result<Option<IoChunk>> {
        if range.start >= self.file_size || range.is_empty() {
            return Ok(None);
        }
        let end = range.end.min(self.file_size);
        let bytes = self
            .reader
            .read_at(range.start..end)
            .map_err(|e| Error::io(format!("read past range at {}", range.start), e))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(IoChunk::new(range.start, bytes)))
    }

    fn close(&self) {
        self.queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_delivers_range_in_order() {
        let blob: Vec<u8> = (0..100u8).collect();
        let reader = Arc::new(blob) as Arc<dyn ReadAt>;
        let source = QueuedChunkSource::spawn(reader, 10..90, 16).unwrap();

        let cancel = Cancellation::new();
        let mut collected = Vec::new();
        let mut expected_offset = 10u64;
        loop {
            match source.wait_chunk(&cancel).unwrap() {
                ChunkDelivery::Chunk(chunk) => {
                    assert_eq!(chunk.offset(), expected_offset);
                    expected_offset = chunk.end();
                    collected.extend_from_slice(chunk.data());
                }
                ChunkDelivery::RangeDone => break,
            }
        }
        assert_eq!(collected, (10..90u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_spawn_with_random_fetch_sizes() {
        let blob: Vec<u8> = (0..255u8).cycle().take(10000).collect();
        for _ in 0..10 {
            let fetch_size = fastrand::usize(1..4096);
            let reader = Arc::new(blob.clone()) as Arc<dyn ReadAt>;
            let source = QueuedChunkSource::spawn(reader, 0..10000, fetch_size).unwrap();
            let cancel = Cancellation::new();
            let mut collected = Vec::new();
            while let ChunkDelivery::Chunk(chunk) = source.wait_chunk(&cancel).unwrap() {
                collected.extend_from_slice(chunk.data());
            }
            assert_eq!(collected, blob);
        }
    }

    #[test]
    fn test_read_past_clamps_to_file_size() {
        let blob: Vec<u8> = (0..50u8).collect();
        let reader = Arc::new(blob) as Arc<dyn ReadAt>;
        let source = QueuedChunkSource::spawn(reader, 0..50, 64).unwrap();

        let chunk = source.read_past(40..200).unwrap().unwrap();
        assert_eq!(chunk.offset(), 40);
        assert_eq!(chunk.len(), 10);
        assert!(source.read_past(50..60).unwrap().is_none());
    }
}
