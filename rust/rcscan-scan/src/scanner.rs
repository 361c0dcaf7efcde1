//! The range scanner: drives header parsing and row group decoding over one
//! assigned byte range and emits projected rows.

use std::sync::Arc;

use rcscan_common::{Result, error::Error, verify_arg};

use rcscan_format::codec::Decompressor;

use crate::{context::ScanContext, header::FileHeader, row_group::RowGroupDecoder};

/// How a range scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every row group starting in the range was decoded and emitted.
    Finished,
    /// Cancellation was observed; the emitted prefix of rows is valid.
    Cancelled,
}

/// Receives decoded rows and, through [`ResourceSink`](crate::ResourceSink),
/// ownership of the I/O buffers the row bytes may reference.
pub trait RowBatch: crate::ResourceSink {
    /// Emits one row; `fields` holds one slice per projected column, in
    /// projection order. The slices are valid only for the duration of the
    /// call.
    fn emit_row(&mut self, fields: &[&[u8]]) -> Result<()>;
}

/// One scanner instance per assigned byte range.
///
/// `parse_header` and `init_range` prepare the scanner; `process_range` then
/// runs the decode loop on the consumer thread until the range is exhausted
/// or cancellation is observed.
pub trait RangeScanner {
    /// Parses file-level metadata. For formats with a file header this runs
    /// once per file, on a stream positioned at offset zero.
    fn parse_header(&mut self) -> Result<()>;

    /// Prepares per-range state before the decode loop.
    fn init_range(&mut self) -> Result<()>;

    /// Decodes row groups and emits rows into `batch` until the range ends.
    ///
    /// Cancellation is a normal outcome, not an error: the scan unwinds,
    /// buffers already referenced by emitted rows are attached to `batch`,
    /// and [`ScanOutcome::Cancelled`] is returned.
    fn process_range(&mut self, batch: &mut dyn RowBatch) -> Result<ScanOutcome>;
}

/// Scanner for RCFile-style columnar files.
pub struct RcFileScanner {
    context: ScanContext,
    stream_index: usize,
    projection: Vec<usize>,
    decompressor: Option<Arc<dyn Decompressor>>,
    header: Option<Arc<FileHeader>>,
    decoder: Option<RowGroupDecoder>,
}

impl RcFileScanner {
    /// Creates a scanner over the stream at `stream_index` of `context`,
    /// emitting the columns listed in `projection`, in that order.
    pub fn new(
        context: ScanContext,
        stream_index: usize,
        projection: Vec<usize>,
        decompressor: Option<Arc<dyn Decompressor>>,
    ) -> RcFileScanner {
        RcFileScanner {
            context,
            stream_index,
            projection,
            decompressor,
            header: None,
            decoder: None,
        }
    }

    pub fn header(&self) -> Option<&Arc<FileHeader>> {
        self.header.as_ref()
    }

    pub fn context_mut(&mut self) -> &mut ScanContext {
        &mut self.context
    }

    fn decode_loop(&mut self, batch: &mut dyn RowBatch) -> Result<()> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("processing a range before parse_header"))?;
        let mut groups = 0usize;
        let mut rows = 0usize;
        loop {
            if self.context.cancelled() {
                return Err(Error::cancelled());
            }
            let stream = self.context.stream(self.stream_index);
            if stream.end_of_range() || stream.eof() {
                break;
            }
            decoder.read_row_group(stream)?;
            groups += 1;
            for _ in 0..decoder.num_rows() {
                decoder.next_row()?;
                let mut fields = Vec::with_capacity(self.projection.len());
                for &column in &self.projection {
                    fields.push(decoder.field(column)?);
                }
                batch.emit_row(&fields)?;
                rows += 1;
            }
            // Buffers fully consumed by this group move to the batch now, in
            // the same order the rows referencing them were emitted.
            self.context.attach_completed_resources(batch, false);
        }
        log::debug!(
            "range {:?} finished: {groups} row group(s), {rows} row(s)",
            self.context.stream(self.stream_index).scan_range()
        );
        Ok(())
    }
}

impl RangeScanner for RcFileScanner {
    fn parse_header(&mut self) -> Result<()> {
        let stream = self.context.stream(self.stream_index);
        let header = Arc::new(FileHeader::parse(stream)?);

        let mut materialize = vec![false; header.num_columns];
        for &column in &self.projection {
            verify_arg!(projection, column < header.num_columns);
            materialize[column] = true;
        }
        self.decoder = Some(RowGroupDecoder::new(
            header.clone(),
            &materialize,
            self.decompressor.clone(),
        )?);
        self.header = Some(header);
        Ok(())
    }

    fn init_range(&mut self) -> Result<()> {
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.reset_row_group();
        }
        Ok(())
    }

    fn process_range(&mut self, batch: &mut dyn RowBatch) -> Result<ScanOutcome> {
        let result = self.decode_loop(batch);
        // Everything still held is force-attached so row bytes emitted before
        // the loop ended stay valid, then the streams are released.
        self.context.attach_completed_resources(batch, true);
        self.context.close();
        match result {
            Ok(()) => Ok(ScanOutcome::Finished),
            Err(e) if e.is_cancelled() => Ok(ScanOutcome::Cancelled),
            Err(e) => Err(e),
        }
    }
}
