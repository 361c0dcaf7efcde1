//! Memory-backed `ReadAt` implementations, used by tests and tooling.

use std::ops::Range;

use bytes::Bytes;

use crate::ReadAt;

impl<T> ReadAt for T
where
    T: details::SliceBytes + Send + Sync + 'static,
{
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if range.end < range.start {
            return Err(std::io::Error::other("invalid range"));
        }
        let pos = range.start as usize;
        let len = (range.end - range.start) as usize;
        let content_len = self.len();
        if pos > content_len {
            return Ok(Bytes::new());
        }
        let len = std::cmp::min(len, content_len - pos);
        Ok(self.slice(pos..pos + len))
    }
}

mod details {
    use std::ops::Range;

    use bytes::Bytes;

    pub trait SliceBytes {
        fn len(&self) -> usize;
        fn slice(&self, range: Range<usize>) -> Bytes;
    }

    impl SliceBytes for Bytes {
        fn len(&self) -> usize {
            Bytes::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::slice(self, range)
        }
    }

    impl SliceBytes for Vec<u8> {
        fn len(&self) -> usize {
            Vec::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::copy_from_slice(&self[range])
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_mem_reader() {
        let blob = b"abcd123".to_vec();
        assert_eq!(blob.size().unwrap(), 7);
        let buf = blob.read_at(1..3).unwrap();
        assert_eq!(buf.as_ref(), b"bc");
        let buf = blob.read_at(4..200).unwrap();
        assert_eq!(buf.as_ref(), b"123");

        let blob = Arc::new(blob) as Arc<dyn ReadAt>;
        let buf = blob.read_at(1..3).unwrap();
        assert_eq!(buf.as_ref(), b"bc");
    }

    #[test]
    fn test_mem_reader_past_end() {
        let blob = Bytes::from_static(b"xyz");
        assert!(blob.read_at(3..8).unwrap().is_empty());
        assert!(blob.read_at(100..108).unwrap().is_empty());
    }
}
