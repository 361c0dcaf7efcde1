//! Bounded chunk queue between the I/O producer and the decoding consumer.

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex},
    time::Duration,
};

use rcscan_common::{Result, error::Error};

use crate::{cancel::Cancellation, chunk::IoChunk};

/// Wait tick for blocking operations; bounds the latency with which a blocked
/// consumer observes cancellation.
const POLL_TICK: Duration = Duration::from_millis(20);

/// A bounded FIFO of [`IoChunk`]s for one scan range.
///
/// The producer `push`es chunks in increasing offset order and calls `finish`
/// (or `fail`) exactly once. The consumer `pop`s, blocking until a chunk is
/// delivered, the range completes, or its cancellation token is set.
pub struct ChunkQueue {
    state: Mutex<QueueState>,
    readable: Condvar,
    writable: Condvar,
    capacity: usize,
}

struct QueueState {
    chunks: VecDeque<IoChunk>,
    finished: bool,
    closed: bool,
    error: Option<Error>,
}

impl ChunkQueue {
    pub const DEFAULT_CAPACITY: usize = 128;

    pub fn new(capacity: usize) -> ChunkQueue {
        ChunkQueue {
            state: Mutex::new(QueueState {
                chunks: VecDeque::new(),
                finished: false,
                closed: false,
                error: None,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueues a chunk, blocking while the queue is at capacity.
    ///
    /// Chunks pushed after `close` are discarded: the consumer has abandoned
    /// the range and no longer wants the bytes.
    pub fn push(&self, chunk: IoChunk) {
        let mut state = self.state.lock().unwrap();
        while state.chunks.len() >= self.capacity && !state.closed {
            state = self.writable.wait_timeout(state, POLL_TICK).unwrap().0;
        }
        if state.closed {
            return;
        }
        state.chunks.push_back(chunk);
        drop(state);
        self.readable.notify_one();
    }

    /// Marks the range as fully delivered.
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.finished = true;
        drop(state);
        self.readable.notify_all();
    }

    /// Records a producer-side failure, surfaced to the consumer on its next
    /// `pop`. Retry policy belongs to the I/O subsystem; the queue only
    /// propagates.
    pub fn fail(&self, error: Error) {
        let mut state = self.state.lock().unwrap();
        state.error = Some(error);
        state.finished = true;
        drop(state);
        self.readable.notify_all();
    }

    /// Dequeues the next chunk, blocking until one is available.
    ///
    /// Returns `Ok(None)` once the producer has finished and the queue is
    /// drained. Returns the cancellation error within a bounded time of
    /// `cancel` being set, even if the producer never delivers.
    pub fn pop(&self, cancel: &Cancellation) -> Result<Option<IoChunk>> {
        let mut state = self.state.lock().unwrap();
        loop {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            if let Some(error) = state.error.take() {
                return Err(error);
            }
            if let Some(chunk) = state.chunks.pop_front() {
                self.writable.notify_one();
                return Ok(Some(chunk));
            }
            if state.finished {
                return Ok(None);
            }
            state = self.readable.wait_timeout(state, POLL_TICK).unwrap().0;
        }
    }

    /// Abandons the queue: drops all pending chunks and unblocks the
    /// producer. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.finished = true;
        state.chunks.clear();
        drop(state);
        self.writable.notify_all();
        self.readable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Instant};

    use bytes::Bytes;

    use super::*;

    fn chunk(offset: u64, data: &'static [u8]) -> IoChunk {
        IoChunk::new(offset, Bytes::from_static(data))
    }

    #[test]
    fn test_push_pop_order() {
        let queue = ChunkQueue::new(8);
        let cancel = Cancellation::new();
        queue.push(chunk(0, b"aa"));
        queue.push(chunk(2, b"bb"));
        queue.finish();

        assert_eq!(queue.pop(&cancel).unwrap().unwrap().offset(), 0);
        assert_eq!(queue.pop(&cancel).unwrap().unwrap().offset(), 2);
        assert!(queue.pop(&cancel).unwrap().is_none());
        // Finished stays sticky.
        assert!(queue.pop(&cancel).unwrap().is_none());
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(ChunkQueue::new(8));
        let cancel = Cancellation::new();
        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                queue.push(chunk(0, b"late"));
            })
        };
        let delivered = queue.pop(&cancel).unwrap().unwrap();
        assert_eq!(delivered.data().as_ref(), b"late");
        producer.join().unwrap();
    }

    #[test]
    fn test_cancellation_unblocks_pop() {
        let queue = ChunkQueue::new(8);
        let cancel = Cancellation::new();
        let controller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                cancel.cancel();
            })
        };
        let start = Instant::now();
        let err = queue.pop(&cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(2));
        controller.join().unwrap();
    }

    #[test]
    fn test_fail_surfaces_to_consumer() {
        let queue = ChunkQueue::new(8);
        let cancel = Cancellation::new();
        queue.fail(Error::io("read", std::io::Error::other("disk gone")));
        let err = queue.pop(&cancel).unwrap_err();
        assert!(matches!(
            err.kind(),
            rcscan_common::error::ErrorKind::Io { .. }
        ));
    }

    #[test]
    fn test_close_discards_and_unblocks() {
        let queue = Arc::new(ChunkQueue::new(1));
        queue.push(chunk(0, b"aa"));
        let producer = {
            let queue = queue.clone();
            // Queue is full; this push blocks until close.
            std::thread::spawn(move || queue.push(chunk(2, b"bb")))
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.close();
        producer.join().unwrap();

        let cancel = Cancellation::new();
        assert!(queue.pop(&cancel).unwrap().is_none());
    }
}
