//! Row group decoding: key section parsing, run-length field walking, and
//! selective column materialization.

use std::sync::Arc;

use rcscan_common::{Result, error::Error, verify_arg, verify_data};
use rcscan_format::{
    codec::Decompressor,
    version::{SYNC_SENTINEL, SyncMarker},
    vint,
};

use crate::{byte_stream::ByteStream, header::FileHeader};

/// Per-column decoding state, reset for every row group.
#[derive(Debug, Default, Clone)]
struct ColumnState {
    /// Whether the query reads this column. Key metadata is still parsed for
    /// skipped columns; their data bytes are never fetched into memory.
    materialize: bool,
    /// On-disk length of this column's data section.
    buffer_len: usize,
    /// Length of the data section after decompression.
    uncompressed_len: usize,
    /// This column's slice of the key buffer, holding run-length encoded
    /// field lengths.
    key_start: usize,
    key_end: usize,
    /// Cursor within `key_start..key_end`.
    key_pos: usize,
    /// Start of this column's decoded data within the row group buffer.
    start_offset: usize,
    /// Bytes of decoded column data consumed so far.
    data_pos: usize,
    /// Length of the current field.
    field_len: usize,
    /// Remaining repetitions of `field_len` before the next length entry.
    field_rep: usize,
    /// Start of the current field within the row group buffer.
    field_offset: usize,
}

/// Decodes row groups from a byte stream, one group at a time.
///
/// A group is consumed in two phases: [`read_row_group`](Self::read_row_group)
/// pulls the group's key section and the data of materialized columns into
/// reusable arenas, then [`next_row`](Self::next_row) walks the run-length
/// encoded field lengths row by row. Field bytes are served as slices into the
/// group arena without further copies.
pub struct RowGroupDecoder {
    header: Arc<FileHeader>,
    decompressor: Option<Arc<dyn Decompressor>>,
    columns: Vec<ColumnState>,
    /// Decoded key section of the current group. Grows to the high-water mark
    /// and is reused across groups.
    key_buffer: Vec<u8>,
    /// Decoded data of the materialized columns, concatenated in column
    /// order. Reused across groups like the key buffer.
    row_group_buffer: Vec<u8>,
    num_rows: usize,
    row_pos: usize,
}

impl RowGroupDecoder {
    /// Creates a decoder for a file with the given header. `materialize` has
    /// one flag per file column; a compressed file requires a decompressor.
    pub fn new(
        header: Arc<FileHeader>,
        materialize: &[bool],
        decompressor: Option<Arc<dyn Decompressor>>,
    ) -> Result<RowGroupDecoder> {
        verify_arg!(materialize, materialize.len() == header.num_columns);
        if header.codec.is_some() && decompressor.is_none() {
            return Err(Error::invalid_operation(
                "decoding a compressed file without a decompressor",
            ));
        }
        let columns = materialize
            .iter()
            .map(|&m| ColumnState {
                materialize: m,
                ..ColumnState::default()
            })
            .collect();
        Ok(RowGroupDecoder {
            header,
            decompressor,
            columns,
            key_buffer: Vec::new(),
            row_group_buffer: Vec::new(),
            num_rows: 0,
            row_pos: 0,
        })
    }

    /// Rows in the current group.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Rows already walked in the current group.
    pub fn row_pos(&self) -> usize {
        self.row_pos
    }

    /// Discards any partially walked group state.
    pub fn reset_row_group(&mut self) {
        self.num_rows = 0;
        self.row_pos = 0;
        self.key_buffer.clear();
        self.row_group_buffer.clear();
        for col in &mut self.columns {
            let materialize = col.materialize;
            *col = ColumnState {
                materialize,
                ..ColumnState::default()
            };
        }
    }

    /// Reads the next row group header, key section and materialized column
    /// data from `stream`.
    ///
    /// A sync sentinel preceding the group is verified against the file
    /// header's marker; a mismatch means the reader has lost its position in
    /// the file and the scan cannot continue.
    pub fn read_row_group(&mut self, stream: &mut ByteStream) -> Result<()> {
        self.reset_row_group();

        let mut record_len = stream.read_int()?;
        if record_len == SYNC_SENTINEL {
            let marker = SyncMarker::from_slice(stream.read_bytes(SyncMarker::LEN, "sync marker")?);
            if marker != self.header.sync {
                return Err(Error::invalid_format(
                    "sync marker",
                    format!(
                        "marker at offset {} does not match the file header",
                        stream.file_offset() - SyncMarker::LEN as u64
                    ),
                ));
            }
            record_len = stream.read_int()?;
        }
        verify_data!(record_len, record_len > 0);

        let key_length = stream.read_int()?;
        verify_data!(key_length, key_length >= 0);
        let compressed_key_length = stream.read_int()?;
        verify_data!(compressed_key_length, compressed_key_length >= 0);

        let num_rows = stream.read_var_int()?;
        verify_data!(num_rows, num_rows >= 0);
        self.num_rows = num_rows as usize;

        self.read_key_buffers(stream, key_length as usize, compressed_key_length as usize)?;
        self.read_column_buffers(stream)?;
        Ok(())
    }

    /// Reads the group's key section and splits it into per-column slices.
    /// The key section is compressed as one unit, unlike column data.
    fn read_key_buffers(
        &mut self,
        stream: &mut ByteStream,
        key_length: usize,
        compressed_key_length: usize,
    ) -> Result<()> {
        match self.header.codec {
            Some(codec) => {
                let decompressor = self
                    .decompressor
                    .clone()
                    .ok_or_else(|| Error::invalid_operation("decompressing without a codec"))?;
                let stored = stream.read_bytes(compressed_key_length, "key section")?;
                let decoded = decompressor.decompress(codec, stored, key_length)?;
                self.key_buffer.extend_from_slice(&decoded);
            }
            None => {
                let stored = stream.read_bytes(key_length, "key section")?;
                self.key_buffer.extend_from_slice(stored);
            }
        }
        verify_data!(key_section, self.key_buffer.len() == key_length);

        let mut pos = 0;
        for col in self.columns.iter_mut() {
            col.buffer_len = read_len(&self.key_buffer, &mut pos, "column buffer length")?;
            col.uncompressed_len =
                read_len(&self.key_buffer, &mut pos, "column uncompressed length")?;
            let key_len = read_len(&self.key_buffer, &mut pos, "column key length")?;
            verify_data!(column_key, pos + key_len <= self.key_buffer.len());
            col.key_start = pos;
            col.key_end = pos + key_len;
            col.key_pos = pos;
            pos += key_len;
        }
        verify_data!(key_section, pos == self.key_buffer.len());
        Ok(())
    }

    /// Fetches the data of materialized columns into the group arena and
    /// skips the rest without copying.
    fn read_column_buffers(&mut self, stream: &mut ByteStream) -> Result<()> {
        for index in 0..self.columns.len() {
            let (materialize, buffer_len, uncompressed_len) = {
                let col = &self.columns[index];
                (col.materialize, col.buffer_len, col.uncompressed_len)
            };
            if !materialize {
                stream.skip_bytes(buffer_len)?;
                continue;
            }
            let start = self.row_group_buffer.len();
            match self.header.codec {
                Some(codec) => {
                    let decompressor = self
                        .decompressor
                        .clone()
                        .ok_or_else(|| Error::invalid_operation("decompressing without a codec"))?;
                    let stored = stream.read_bytes(buffer_len, "column data")?;
                    let decoded = decompressor.decompress(codec, stored, uncompressed_len)?;
                    self.row_group_buffer.extend_from_slice(&decoded);
                }
                None => {
                    let stored = stream.read_bytes(buffer_len, "column data")?;
                    self.row_group_buffer.extend_from_slice(stored);
                }
            }
            self.columns[index].start_offset = start;
        }
        Ok(())
    }

    /// Advances every materialized column to its next field.
    ///
    /// After the call, [`field`](Self::field) serves the bytes of the row
    /// just reached. Walking the final row verifies that every materialized
    /// column consumed exactly its declared key and data bytes.
    pub fn next_row(&mut self) -> Result<()> {
        if self.row_pos >= self.num_rows {
            return Err(Error::invalid_operation(
                "advancing past the last row of a group",
            ));
        }
        for index in 0..self.columns.len() {
            if self.columns[index].materialize {
                self.next_field(index)?;
            }
        }
        self.row_pos += 1;
        if self.row_pos == self.num_rows {
            self.verify_group_exhausted()?;
        }
        Ok(())
    }

    /// Advances one column by one field, expanding the run-length encoding:
    /// a non-negative entry is a new field length, a negative entry `-r`
    /// repeats the previous length `r` more times.
    fn next_field(&mut self, index: usize) -> Result<()> {
        let data_len = self.column_data_len(index);
        let col = &mut self.columns[index];
        if col.field_rep > 0 {
            col.field_rep -= 1;
        } else {
            verify_data!(column_key, col.key_pos < col.key_end);
            let entry = vint::read_var_long_at(&self.key_buffer, &mut col.key_pos)?;
            verify_data!(column_key, col.key_pos <= col.key_end);
            if entry < 0 {
                let repeats = entry
                    .checked_neg()
                    .ok_or_else(|| Error::invalid_format("column key", "invalid repeat count"))?;
                col.field_rep = (repeats - 1) as usize;
            } else {
                col.field_len = entry as usize;
            }
        }
        col.field_offset = col.start_offset + col.data_pos;
        col.data_pos += col.field_len;
        verify_data!(column_data, col.data_pos <= data_len);
        Ok(())
    }

    /// The bytes of `column`'s field in the current row. Valid after
    /// [`next_row`](Self::next_row) and only for materialized columns.
    pub fn field(&self, column: usize) -> Result<&[u8]> {
        verify_arg!(column, column < self.columns.len());
        let col = &self.columns[column];
        verify_arg!(column, col.materialize);
        if self.row_pos == 0 {
            return Err(Error::invalid_operation("reading a field before any row"));
        }
        Ok(&self.row_group_buffer[col.field_offset..col.field_offset + col.field_len])
    }

    fn column_data_len(&self, index: usize) -> usize {
        let col = &self.columns[index];
        if self.header.codec.is_some() {
            col.uncompressed_len
        } else {
            col.buffer_len
        }
    }

    /// Checks that the walk consumed the group exactly: every materialized
    /// column must be at the end of its key slice with no pending repeats and
    /// all of its data bytes accounted for.
    fn verify_group_exhausted(&self) -> Result<()> {
        for index in 0..self.columns.len() {
            let col = &self.columns[index];
            if !col.materialize {
                continue;
            }
            let data_len = self.column_data_len(index);
            if col.key_pos != col.key_end || col.field_rep != 0 || col.data_pos != data_len {
                return Err(Error::invalid_format(
                    "row group",
                    format!(
                        "column {index} walk did not consume the group: \
                         key {}/{}, repeats {}, data {}/{}",
                        col.key_pos - col.key_start,
                        col.key_end - col.key_start,
                        col.field_rep,
                        col.data_pos,
                        data_len
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn read_len(buf: &[u8], pos: &mut usize, element: &str) -> Result<usize> {
    let value = vint::read_var_long_at(buf, pos)?;
    if value < 0 {
        return Err(Error::invalid_format(element, format!("negative length {value}")));
    }
    Ok(value as usize)
}
