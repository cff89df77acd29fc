//! `ReadAt` wrapper counting the reads issued against it.

use std::{
    ops::Range,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use orcsplit_io::ReadAt;

/// `ReadAt` wrapper recording every `read_at` call.
///
/// Clones share the counters, so a test can keep one handle while the code
/// under test owns another.
pub struct CountingReadAt<R> {
    inner: Arc<R>,
    stats: Arc<ReadStats>,
}

impl<R> Clone for CountingReadAt<R> {
    fn clone(&self) -> Self {
        CountingReadAt {
            inner: self.inner.clone(),
            stats: self.stats.clone(),
        }
    }
}

#[derive(Default)]
struct ReadStats {
    reads: AtomicU64,
    bytes: AtomicU64,
    ranges: Mutex<Vec<Range<u64>>>,
}

impl<R: ReadAt> CountingReadAt<R> {
    pub fn new(inner: R) -> CountingReadAt<R> {
        CountingReadAt {
            inner: Arc::new(inner),
            stats: Default::default(),
        }
    }
}

impl<R> CountingReadAt<R> {
    /// Number of `read_at` calls so far.
    pub fn reads(&self) -> u64 {
        self.stats.reads.load(Ordering::SeqCst)
    }

    /// Total bytes returned so far.
    pub fn bytes_read(&self) -> u64 {
        self.stats.bytes.load(Ordering::SeqCst)
    }

    /// Requested ranges, in call order.
    pub fn ranges(&self) -> Vec<Range<u64>> {
        self.stats.ranges.lock().expect("lock").clone()
    }

    pub fn reset(&self) {
        self.stats.reads.store(0, Ordering::SeqCst);
        self.stats.bytes.store(0, Ordering::SeqCst);
        self.stats.ranges.lock().expect("lock").clear();
    }
}

impl<R: ReadAt> ReadAt for CountingReadAt<R> {
    fn size(&self) -> std::io::Result<u64> {
        self.inner.size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        self.stats.ranges.lock().expect("lock").push(range.clone());
        let bytes = self.inner.read_at(range)?;
        self.stats
            .bytes
            .fetch_add(bytes.len() as u64, Ordering::SeqCst);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use orcsplit_io::ReadAt;

    use super::CountingReadAt;

    #[test]
    fn test_counts_reads() {
        let counting = CountingReadAt::new(b"0123456789".to_vec());
        let handle = counting.clone();
        assert_eq!(counting.read_at(2..5).unwrap().as_ref(), b"234");
        assert_eq!(counting.read_at(8..20).unwrap().as_ref(), b"89");
        assert_eq!(handle.reads(), 2);
        assert_eq!(handle.bytes_read(), 5);
        assert_eq!(handle.ranges(), vec![2..5, 8..20]);
        handle.reset();
        assert_eq!(counting.reads(), 0);
    }
}
