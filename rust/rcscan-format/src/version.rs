//! File version tags and the sync marker.

use rcscan_common::Result;

/// Version tag shared with the SequenceFile format: pre hive-0.9 RCFiles
/// carry the SequenceFile header verbatim.
pub const SEQ6_MAGIC: [u8; 4] = [b'S', b'E', b'Q', 6];

/// Version tag written by hive-0.9 and later.
pub const RCF1_MAGIC: [u8; 4] = [b'R', b'C', b'F', 1];

/// Key class name stored in legacy (`Seq6`) headers. Read for presence only.
pub const KEY_CLASS_NAME: &str = "org.apache.hadoop.hive.ql.io.RCFile$KeyBuffer";

/// Value class name stored in legacy (`Seq6`) headers. Read for presence only.
pub const VALUE_CLASS_NAME: &str = "org.apache.hadoop.hive.ql.io.RCFile$ValueBuffer";

/// Header metadata key holding the number of columns in the file.
pub const NUM_COLUMNS_KEY: &str = "hive.io.rcfile.column.number";

/// Fixed-int sentinel preceding an in-band sync marker within a row group
/// header.
pub const SYNC_SENTINEL: i32 = -1;

/// Recognized file format versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// SequenceFile-compatible header: class names and a block-compression
    /// flag precede the codec section.
    Seq6,
    /// The dedicated RCFile header introduced by hive-0.9.
    Rcf1,
}

impl Version {
    /// Maps a 4-byte magic tag to a version, or fails with the offending bytes.
    pub fn from_magic(magic: &[u8]) -> Result<Version> {
        if magic == SEQ6_MAGIC {
            Ok(Version::Seq6)
        } else if magic == RCF1_MAGIC {
            Ok(Version::Rcf1)
        } else {
            Err(rcscan_common::error::Error::unsupported(
                "version tag",
                format!("{magic:02x?}"),
            ))
        }
    }

    /// Legacy headers carry extra SequenceFile compatibility fields.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Version::Seq6)
    }
}

/// The 16-byte marker generated by the writer, repeated at row group
/// boundaries so that readers can detect and skip corrupted groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMarker(pub [u8; SyncMarker::LEN]);

impl SyncMarker {
    pub const LEN: usize = 16;

    pub fn from_slice(bytes: &[u8]) -> SyncMarker {
        let mut marker = [0u8; Self::LEN];
        marker.copy_from_slice(bytes);
        SyncMarker(marker)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
