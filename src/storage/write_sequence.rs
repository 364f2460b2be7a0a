//! Per-tree write sequence.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter stamped into every written block.
///
/// Two intact copies of the same logical page can both survive a crash; the
/// one with the larger sequence is the newer. The counter is owned by the
/// tree and shared with the block layer by reference, so every writer of a
/// tree draws from the same sequence.
///
/// A value drawn for a write that later fails is simply skipped: gaps are
/// harmless, reuse is not.
///
/// # Example
/// ```
/// use treeblock::WriteSequence;
///
/// let seq = WriteSequence::new();
/// assert_eq!(seq.next(), 1);
/// assert_eq!(seq.next(), 2);
/// assert_eq!(seq.current(), 2);
/// ```
#[derive(Debug, Default)]
pub struct WriteSequence {
    last: AtomicU64,
}

impl WriteSequence {
    /// Start a fresh sequence; the first value handed out is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after `max_seen`, the largest sequence found on disk.
    pub fn resume_after(max_seen: u64) -> Self {
        Self {
            last: AtomicU64::new(max_seen),
        }
    }

    /// Draw the next value.
    #[inline]
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Most recently drawn value (0 if none).
    #[inline]
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    /// Raise the counter to at least `seen`.
    ///
    /// Called while scanning blocks at open so later writes sort after
    /// everything already on disk.
    pub fn observe(&self, seen: u64) {
        self.last.fetch_max(seen, Ordering::AcqRel);
    }
}
