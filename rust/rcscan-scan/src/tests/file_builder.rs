//! In-memory writer producing files the scanner can decode, plus a mock
//! codec. Test support only; production writes are out of scope.

use bytes::Bytes;
use rcscan_common::{Result, error::Error};
use rcscan_format::{
    codec::{CodecId, Decompressor},
    version::{
        KEY_CLASS_NAME, NUM_COLUMNS_KEY, RCF1_MAGIC, SEQ6_MAGIC, SYNC_SENTINEL, VALUE_CLASS_NAME,
        Version,
    },
    vint::{write_text, write_var_long},
};

/// The codec class name the builder declares for compressed files. The mock
/// decompressor is registered under a real class name so header parsing takes
/// the production path.
pub const MOCK_CODEC_CLASS: &str = "org.apache.hadoop.io.compress.GzipCodec";

const MOCK_MARKER: u8 = 0x55;

/// Fake compression: a one-byte marker followed by the raw data. The length
/// change makes the stored and decoded sizes differ, like a real codec.
pub struct MockDecompressor;

impl Decompressor for MockDecompressor {
    fn decompress(&self, _codec: CodecId, input: &[u8], uncompressed_len: usize) -> Result<Bytes> {
        if input.first() != Some(&MOCK_MARKER) {
            return Err(Error::invalid_format("mock codec", "missing marker byte"));
        }
        let data = &input[1..];
        if data.len() != uncompressed_len {
            return Err(Error::invalid_format(
                "mock codec",
                format!("{} bytes decoded, {uncompressed_len} declared", data.len()),
            ));
        }
        Ok(Bytes::copy_from_slice(data))
    }
}

fn mock_compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(MOCK_MARKER);
    out.extend_from_slice(data);
    out
}

/// Run-length encodes per-row field lengths: each distinct length is written
/// once, and a run of `r` additional repeats is written as `-r`.
fn encode_lengths(lengths: &[usize]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == len {
            run += 1;
        }
        write_var_long(&mut buf, len as i64);
        if run > 1 {
            write_var_long(&mut buf, -((run - 1) as i64));
        }
        i += run;
    }
    buf
}

/// Builds a columnar file in memory, row group by row group.
pub struct FileBuilder {
    compressed: bool,
    num_columns: usize,
    sync: [u8; 16],
    bytes: Vec<u8>,
}

impl FileBuilder {
    pub fn new(version: Version, num_columns: usize, compressed: bool) -> FileBuilder {
        let mut sync = [0u8; 16];
        for (i, b) in sync.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        let mut bytes = Vec::new();
        match version {
            Version::Seq6 => bytes.extend_from_slice(&SEQ6_MAGIC),
            Version::Rcf1 => bytes.extend_from_slice(&RCF1_MAGIC),
        }
        if version.is_legacy() {
            write_text(&mut bytes, KEY_CLASS_NAME);
            write_text(&mut bytes, VALUE_CLASS_NAME);
        }
        bytes.push(compressed as u8);
        if version.is_legacy() {
            bytes.push(0);
        }
        if compressed {
            write_text(&mut bytes, MOCK_CODEC_CLASS);
        }
        bytes.extend_from_slice(&1i32.to_be_bytes());
        write_text(&mut bytes, NUM_COLUMNS_KEY);
        write_text(&mut bytes, &num_columns.to_string());
        bytes.extend_from_slice(&sync);
        FileBuilder {
            compressed,
            num_columns,
            sync,
            bytes,
        }
    }

    pub fn sync(&self) -> [u8; 16] {
        self.sync
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Appends a row group preceded by a sync marker.
    pub fn add_row_group(&mut self, rows: &[Vec<&[u8]>]) {
        let sync = self.sync;
        self.add_row_group_opts(rows, Some(sync));
    }

    /// Appends a row group; `sync` controls the optional marker before the
    /// group and may deliberately differ from the header's.
    pub fn add_row_group_opts(&mut self, rows: &[Vec<&[u8]>], sync: Option<[u8; 16]>) {
        assert!(rows.iter().all(|r| r.len() == self.num_columns));

        let mut col_data: Vec<Vec<u8>> = vec![Vec::new(); self.num_columns];
        let mut col_lengths: Vec<Vec<usize>> = vec![Vec::new(); self.num_columns];
        for row in rows {
            for (c, field) in row.iter().enumerate() {
                col_data[c].extend_from_slice(field);
                col_lengths[c].push(field.len());
            }
        }
        let stored_data: Vec<Vec<u8>> = col_data
            .iter()
            .map(|d| self.maybe_compress(d))
            .collect();

        let mut key = Vec::new();
        for c in 0..self.num_columns {
            let key_bytes = encode_lengths(&col_lengths[c]);
            write_var_long(&mut key, stored_data[c].len() as i64);
            write_var_long(&mut key, col_data[c].len() as i64);
            write_var_long(&mut key, key_bytes.len() as i64);
            key.extend_from_slice(&key_bytes);
        }
        let stored_key = self.maybe_compress(&key);

        if let Some(sync) = sync {
            self.bytes.extend_from_slice(&SYNC_SENTINEL.to_be_bytes());
            self.bytes.extend_from_slice(&sync);
        }
        let data_len: usize = stored_data.iter().map(|d| d.len()).sum();
        let record_len = stored_key.len() + data_len;
        self.bytes.extend_from_slice(&(record_len as i32).to_be_bytes());
        self.bytes.extend_from_slice(&(key.len() as i32).to_be_bytes());
        self.bytes
            .extend_from_slice(&(stored_key.len() as i32).to_be_bytes());
        write_var_long(&mut self.bytes, rows.len() as i64);
        self.bytes.extend_from_slice(&stored_key);
        for data in &stored_data {
            self.bytes.extend_from_slice(data);
        }
    }

    fn maybe_compress(&self, data: &[u8]) -> Vec<u8> {
        if self.compressed {
            mock_compress(data)
        } else {
            data.to_vec()
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
