//! I/O abstractions:
//! - `ReadAt`: positional reader with the ability to fetch a specified byte range from a file/blob.
//! - `SlicedFile`: a `ReadAt` view restricted to one byte range of another reader.
//! - `PrecachedReadAt`: a reader that serves a pre-fetched region (e.g. the file tail) from memory.
//!
//! Provides a couple of simple implementations: memory-based and file-based.

use std::{ops::Range, sync::Arc};

use bytes::Bytes;

pub mod file;
pub mod memory;
pub mod utils;

pub use file::FileReader;
pub use utils::{precached_read::PrecachedReadAt, sliced_file::SlicedFile};

/// A trait representing a conceptual file or buffer that supports reading from arbitrary
/// positions.
///
/// Reads are positional: there is no shared cursor, so concurrent readers of the same
/// object (e.g. several splits of one file) never disturb each other.
pub trait ReadAt: Send + Sync + 'static {
    /// Returns the size of the underlying object.
    fn size(&self) -> std::io::Result<u64>;

    /// Reads a specified range of bytes from the object.
    ///
    /// **NOTE**: `read_at` should not return with a short read, unless end-of-file
    /// is encountered.
    ///
    /// # Arguments
    ///
    /// * `range` - A `Range<u64>` that specifies the start and end positions for reading.
    ///   The function may return fewer bytes than requested if the range extends beyond
    ///   the end of the object.
    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

impl<T> ReadAt for Arc<T>
where
    T: ReadAt + ?Sized,
{
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.as_ref().read_at(range)
    }
}

impl<T> ReadAt for Box<T>
where
    T: ReadAt + ?Sized,
{
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.as_ref().read_at(range)
    }
}
