//! Compression codec identities and the decompression collaborator interface.
//!
//! The file header names a Hadoop codec class; the scanner maps it to a
//! [`CodecId`] and delegates the actual bytes-to-bytes work to a
//! [`Decompressor`] supplied by the embedding engine. This crate never
//! implements a codec itself.

use bytes::Bytes;
use rcscan_common::{Result, error::Error};

/// Compression codecs a file may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Gzip,
    Deflate,
    Bzip2,
    Snappy,
}

const CODEC_CLASSES: &[(&str, CodecId)] = &[
    ("org.apache.hadoop.io.compress.GzipCodec", CodecId::Gzip),
    ("org.apache.hadoop.io.compress.DefaultCodec", CodecId::Deflate),
    ("org.apache.hadoop.io.compress.BZip2Codec", CodecId::Bzip2),
    ("org.apache.hadoop.io.compress.SnappyCodec", CodecId::Snappy),
];

/// Resolves a Hadoop codec class name to a codec identifier.
///
/// An unrecognized name is a fatal error for the file: retrying cannot change
/// the stored bytes, and decoding without the right codec is impossible.
pub fn resolve_codec(class_name: &str) -> Result<CodecId> {
    for (name, id) in CODEC_CLASSES {
        if *name == class_name {
            log::debug!("resolved codec class '{class_name}' to {id:?}");
            return Ok(*id);
        }
    }
    Err(Error::unsupported("compression codec", class_name))
}

/// Bytes-to-bytes decompression, implemented by the embedding engine.
///
/// `uncompressed_len` is the size the format declares for the output;
/// implementations must fail if the actual output size differs, since a
/// mismatch means either corruption or a codec mixup.
pub trait Decompressor: Send + Sync {
    fn decompress(&self, codec: CodecId, input: &[u8], uncompressed_len: usize) -> Result<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_codecs() {
        assert_eq!(
            resolve_codec("org.apache.hadoop.io.compress.GzipCodec").unwrap(),
            CodecId::Gzip
        );
        assert_eq!(
            resolve_codec("org.apache.hadoop.io.compress.DefaultCodec").unwrap(),
            CodecId::Deflate
        );
        assert_eq!(
            resolve_codec("org.apache.hadoop.io.compress.SnappyCodec").unwrap(),
            CodecId::Snappy
        );
    }

    #[test]
    fn test_resolve_unknown_codec() {
        let err = resolve_codec("com.example.MysteryCodec").unwrap_err();
        let rcscan_common::error::ErrorKind::Unsupported { value, .. } = err.kind() else {
            panic!("expected Unsupported, got {err:?}");
        };
        assert_eq!(value, "com.example.MysteryCodec");
    }
}
