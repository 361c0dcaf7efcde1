//! File header parsing.

use rcscan_common::{Result, error::Error, verify_data};
use rcscan_format::{
    codec::{self, CodecId},
    version::{NUM_COLUMNS_KEY, SyncMarker, Version},
};

use crate::byte_stream::ByteStream;

/// Parsed file-level metadata, fixed for the lifetime of the file.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub version: Version,
    /// Codec declared by the header, `None` for uncompressed files.
    pub codec: Option<CodecId>,
    /// Number of columns in every row group of the file.
    pub num_columns: usize,
    /// The writer's sync marker, repeated at row group boundaries.
    pub sync: SyncMarker,
}

impl FileHeader {
    /// Parses the header from the start of `stream`.
    ///
    /// The stream must be positioned at file offset zero; header parsing is
    /// strictly sequential since each field determines whether the next one
    /// is present.
    pub fn parse(stream: &mut ByteStream) -> Result<FileHeader> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(stream.read_bytes(4, "version tag")?);
        let version = Version::from_magic(&magic)?;

        if version.is_legacy() {
            // Key and value class names; their content carries no information
            // the reader needs.
            stream.skip_text()?;
            stream.skip_text()?;
        }

        let compressed = stream.read_bool()?;
        if version.is_legacy() {
            let block_compressed = stream.read_bool()?;
            if block_compressed {
                return Err(Error::invalid_format(
                    "header",
                    "block-compressed files are not supported",
                ));
            }
        }

        let codec = if compressed {
            let class_bytes = stream.read_text()?;
            let class_name = std::str::from_utf8(&class_bytes).map_err(|_| {
                Error::invalid_format("codec class name", "not valid UTF-8")
            })?;
            Some(codec::resolve_codec(class_name)?)
        } else {
            None
        };

        let num_columns = read_num_columns(stream)?;

        let sync = SyncMarker::from_slice(stream.read_bytes(SyncMarker::LEN, "sync marker")?);

        log::debug!(
            "parsed header: {version:?}, codec {codec:?}, {num_columns} column(s)"
        );
        Ok(FileHeader {
            version,
            codec,
            num_columns,
            sync,
        })
    }
}

/// Walks the header metadata map and extracts the mandatory column count.
fn read_num_columns(stream: &mut ByteStream) -> Result<usize> {
    let entries = stream.read_int()?;
    verify_data!(metadata_count, entries >= 0);
    let mut num_columns = None;
    for _ in 0..entries {
        let key = stream.read_text()?;
        let value = stream.read_text()?;
        if key == NUM_COLUMNS_KEY.as_bytes() {
            let text = std::str::from_utf8(&value).map_err(|_| {
                Error::invalid_format(NUM_COLUMNS_KEY, "not valid UTF-8")
            })?;
            let parsed = text.trim().parse::<usize>().map_err(|_| {
                Error::invalid_format(NUM_COLUMNS_KEY, format!("not a column count: '{text}'"))
            })?;
            num_columns = Some(parsed);
        }
    }
    num_columns
        .ok_or_else(|| Error::invalid_format("header metadata", format!("missing {NUM_COLUMNS_KEY}")))
}
