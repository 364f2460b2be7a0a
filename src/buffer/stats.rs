//! Block I/O statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by the block layer.
///
/// All fields are atomic for lock-free, thread-safe updates.
///
/// # Memory Ordering
/// We use `Ordering::Relaxed` for all operations: counters are independent
/// and only need atomicity, not ordering against each other.
///
/// # Example
/// ```
/// use treeblock::BlockStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BlockStats::new();
/// stats.blocks_written.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().blocks_written, 1);
/// ```
#[derive(Debug, Default)]
pub struct BlockStats {
    pub blocks_read: AtomicU64,
    pub blocks_written: AtomicU64,
    /// On-disk bytes read.
    pub bytes_read: AtomicU64,
    /// On-disk bytes written (after compression and alignment).
    pub bytes_written: AtomicU64,
    /// Writes that stored the compressed form.
    pub compressed_writes: AtomicU64,
    /// Compression attempts abandoned (failed or not smaller).
    pub compression_fallbacks: AtomicU64,
    pub decompressions: AtomicU64,
    pub checksum_failures: AtomicU64,
}

impl BlockStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get a non-atomic copy for display/logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            compressed_writes: self.compressed_writes.load(Ordering::Relaxed),
            compression_fallbacks: self.compression_fallbacks.load(Ordering::Relaxed),
            decompressions: self.decompressions.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.blocks_read.store(0, Ordering::Relaxed);
        self.blocks_written.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.compressed_writes.store(0, Ordering::Relaxed);
        self.compression_fallbacks.store(0, Ordering::Relaxed);
        self.decompressions.store(0, Ordering::Relaxed);
        self.checksum_failures.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of block statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub blocks_read: u64,
    pub blocks_written: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub compressed_writes: u64,
    pub compression_fallbacks: u64,
    pub decompressions: u64,
    pub checksum_failures: u64,
}

impl StatsSnapshot {
    /// Fraction of written blocks stored compressed (0.0 to 1.0).
    pub fn compression_rate(&self) -> f64 {
        if self.blocks_written == 0 {
            0.0
        } else {
            self.compressed_writes as f64 / self.blocks_written as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ reads: {}, writes: {}, compressed: {:.2}%, fallbacks: {}, checksum failures: {} }}",
            self.blocks_read,
            self.blocks_written,
            self.compression_rate() * 100.0,
            self.compression_fallbacks,
            self.checksum_failures
        )
    }
}
