//! The scan read path for RCFile-style columnar files.
//!
//! A [`ByteStream`](byte_stream::ByteStream) stitches asynchronously arriving
//! I/O chunks into one logical byte stream with a zero-copy fast path; a
//! [`RowGroupDecoder`](row_group::RowGroupDecoder) walks that stream one row
//! group at a time, expanding the run-length-encoded field lengths and
//! materializing only the columns the query needs. The
//! [`RcFileScanner`](scanner::RcFileScanner) ties both to a
//! [`ScanContext`](context::ScanContext) that carries cancellation and hands
//! consumed buffers to the output in row-emission order.

pub mod byte_stream;
pub mod context;
pub mod header;
pub mod row_group;
pub mod scanner;

#[cfg(test)]
mod tests;

pub use byte_stream::{ByteStream, ScanRange};
pub use context::{ResourceSink, ScanContext};
pub use header::FileHeader;
pub use row_group::RowGroupDecoder;
pub use scanner::{RangeScanner, RcFileScanner, RowBatch, ScanOutcome};
