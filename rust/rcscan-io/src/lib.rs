//! I/O collaborator surface of the scan read path:
//! - `ReadAt`: positional reader able to fetch a byte range from a file/blob.
//! - `IoChunk` and `ChunkSource`: ownership-transferring delivery of scan
//!   range bytes from the I/O subsystem to a single consuming decoder thread.
//! - `ChunkQueue` and `Cancellation`: the producer/consumer handshake.
//! - `QueuedChunkSource`: a background producer filling a queue from a
//!   `ReadAt`.

use std::{ops::Range, sync::Arc};

use bytes::Bytes;

pub mod cancel;
pub mod chunk;
pub mod fetcher;
pub mod io_pool;
pub mod memory;
pub mod queue;

pub use cancel::Cancellation;
pub use chunk::{ChunkDelivery, ChunkSource, IoChunk};
pub use fetcher::QueuedChunkSource;
pub use queue::ChunkQueue;

/// A conceptual file or buffer that supports reading from arbitrary positions.
pub trait ReadAt: Send + Sync + 'static {
    /// Returns the size of the underlying object.
    fn size(&self) -> std::io::Result<u64>;

    /// Reads a specified range of bytes from the object.
    ///
    /// **NOTE**: `read_at` should not return with a short read, unless
    /// end-of-file is encountered.
    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

impl<T> ReadAt for Arc<T>
where
    T: ReadAt + ?Sized,
{
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.as_ref().read_at(range)
    }
}
