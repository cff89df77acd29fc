//! A `ReadAt` adapter that restricts reads to a specified range of the underlying reader.

use std::ops::Range;

use bytes::Bytes;

use crate::ReadAt;

/// A `ReadAt` adapter that restricts reads to a specified range of the underlying
/// reader.
///
/// All reads are **relative to the slice's starting position** and never reach
/// outside of the slice, whatever the size of the underlying object. Stripe
/// decoders receive their input through a `SlicedFile` covering exactly one stripe.
///
/// For example, if the underlying reader has a size of 100, and a `SlicedFile` is created
/// with a range of `10..20`, then:
///
/// *   `size()` returns `10`.
/// *   `read_at(0..5)` reads bytes 10-15 from the underlying reader.
/// *   `read_at(0..15)` reads bytes 10-20 from the underlying reader (clamped to the slice).
pub struct SlicedFile<F> {
    inner: F,
    range: Range<u64>,
}

impl<F> SlicedFile<F> {
    /// Creates a new `SlicedFile` adapter.
    ///
    /// # Panics
    ///
    /// Panics if `range.start > range.end`.
    pub fn new(inner: F, range: Range<u64>) -> Self {
        assert!(range.start <= range.end);
        Self { inner, range }
    }

    /// Returns the size of the slice.
    pub fn slice_size(&self) -> u64 {
        self.range.end - self.range.start
    }

    /// Returns the range of the slice within the underlying reader.
    pub fn slice_range(&self) -> Range<u64> {
        self.range.clone()
    }

}

impl<R: ReadAt> SlicedFile<R> {
    /// Reads the entire range of bytes represented by this `SlicedFile`
    /// from the underlying reader.
    pub fn read_all(&self) -> std::io::Result<Bytes> {
        self.inner.read_at(self.range.clone())
    }
}

impl<R: ReadAt> ReadAt for SlicedFile<R> {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.slice_size())
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        let slice_size = self.slice_size();
        let start = range.start;
        let end = std::cmp::min(slice_size, range.end);
        if start >= end {
            return Ok(Bytes::new());
        }

        let inner_start = self
            .range
            .start
            .checked_add(start)
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
        let inner_end = self
            .range
            .start
            .checked_add(end)
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
        self.inner.read_at(inner_start..inner_end)
    }
}

impl<R: Clone> Clone for SlicedFile<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            range: self.range.clone(),
        }
    }
}
