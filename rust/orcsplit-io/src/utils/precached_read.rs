//! A reader that maintains a pre-cached region of data from an underlying reader.

use std::ops::Range;

use bytes::Bytes;

use crate::ReadAt;

/// A reader that maintains a pre-cached region of data from an underlying reader.
///
/// Reads that are entirely within the cached region are served from memory, while
/// other reads are forwarded to the underlying reader.
///
/// The stripe catalog pre-caches a fixed-size suffix of the file: the postscript and,
/// for most files, the whole footer fit into it, so parsing the tail costs one request.
pub struct PrecachedReadAt<R> {
    /// Underlying (source) reader
    inner: R,
    /// Total size of the source reader
    size: u64,
    /// Cached fragment of the source reader
    cached_buffer: Bytes,
    /// Offset of the cached fragment within the source reader
    cached_offset: u64,
}

impl<R: ReadAt> PrecachedReadAt<R> {
    /// Creates a new `PrecachedReadAt` that caches the last `suffix_size` bytes of the reader.
    ///
    /// If `suffix_size` is larger than the reader's size, the entire reader is cached.
    pub fn from_suffix(inner: R, suffix_size: u64) -> std::io::Result<Self> {
        let size = inner.size()?;
        let cached_offset = size.saturating_sub(suffix_size);
        let cached_buffer = if cached_offset < size {
            inner.read_at(cached_offset..size)?
        } else {
            Bytes::new()
        };
        if (cached_buffer.len() as u64) < size - cached_offset {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read of the cached suffix",
            ));
        }

        Ok(Self {
            inner,
            size,
            cached_buffer,
            cached_offset,
        })
    }
}

impl<R> PrecachedReadAt<R> {
    /// Returns the size of the underlying object.
    pub fn object_size(&self) -> u64 {
        self.size
    }

    /// Returns the pre-cached buffer range.
    pub fn precached_range(&self) -> Range<u64> {
        self.cached_offset..self.cached_offset + self.cached_buffer.len() as u64
    }
}

impl<R: ReadAt> ReadAt for PrecachedReadAt<R> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.size)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        if range.start >= self.size || range.start >= range.end {
            return Ok(Bytes::new());
        }
        let range = range.start..range.end.min(self.size);

        let cached_end = self.cached_offset + self.cached_buffer.len() as u64;
        if range.start >= self.cached_offset && range.end <= cached_end {
            let buffer_start = (range.start - self.cached_offset) as usize;
            let buffer_end = (range.end - self.cached_offset) as usize;
            return Ok(self.cached_buffer.slice(buffer_start..buffer_end));
        }

        self.inner.read_at(range)
    }
}
