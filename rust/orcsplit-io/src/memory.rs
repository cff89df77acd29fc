//! `ReadAt` implementations for memory buffers.

use std::ops::Range;

use bytes::Bytes;

use crate::{ReadAt, verify};

impl ReadAt for Vec<u8> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        verify!(range.end >= range.start);
        let (start, end) = clamp_range(range, self.len());
        if start >= end {
            return Ok(Bytes::new());
        }
        Ok(Bytes::copy_from_slice(&self[start..end]))
    }
}

impl ReadAt for Bytes {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        verify!(range.end >= range.start);
        let (start, end) = clamp_range(range, self.len());
        if start >= end {
            return Ok(Bytes::new());
        }
        Ok(self.slice(start..end))
    }
}

fn clamp_range(range: Range<u64>, len: usize) -> (usize, usize) {
    let len = len as u64;
    (range.start.min(len) as usize, range.end.min(len) as usize)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::ReadAt;

    #[test]
    fn test_mem_reader() {
        let blob = b"abcd123".to_vec();
        assert_eq!(blob.size().unwrap(), 7);
        let buf = blob.read_at(1..3).unwrap();
        assert_eq!(buf.as_ref(), b"bc");
        let buf = blob.read_at(4..200).unwrap();
        assert_eq!(buf.as_ref(), b"123");
        assert!(blob.read_at(8..10).unwrap().is_empty());
        assert!(blob.read_at(u64::MAX - 1..u64::MAX).unwrap().is_empty());

        let blob = Arc::new(blob) as Arc<dyn ReadAt>;
        let buf = blob.read_at(1..3).unwrap();
        assert_eq!(buf.as_ref(), b"bc");
    }

    #[test]
    fn test_boxed_readers() {
        let boxed: Box<dyn ReadAt> = Box::new(b"abcdef".to_vec());
        assert_eq!(boxed.size().unwrap(), 6);
        assert_eq!(boxed.read_at(2..4).unwrap().as_ref(), b"cd");

        let nested = Arc::new(Box::new(Bytes::from_static(b"xyz")));
        assert_eq!(nested.read_at(1..10).unwrap().as_ref(), b"yz");
    }

    #[test]
    fn test_bytes_reader_is_zero_copy() {
        let blob = Bytes::from_static(b"0123456789");
        let buf = blob.read_at(2..5).unwrap();
        assert_eq!(buf.as_ref(), b"234");
        assert_eq!(buf.as_ptr(), blob[2..].as_ptr());
    }
}
