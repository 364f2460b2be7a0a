//! Block space allocation.
//!
//! The write pipeline claims file space through [`BlockAllocator`] exactly
//! once per block. [`AppendAllocator`] hands out space at the end of the
//! file; reclaiming freed blocks is left to a free-space map built on top.

use parking_lot::Mutex;

use crate::common::{BlockAddr, Error, Result};

/// Maps a requested block size to an on-disk address.
pub trait BlockAllocator: Send + Sync {
    /// Unit the returned addresses are counted in.
    fn allocation_unit(&self) -> u32;

    /// Claim `size` bytes (a multiple of the allocation unit).
    ///
    /// # Errors
    /// - `Error::InvalidBlockSize` if `size` is not a positive multiple of
    ///   the allocation unit
    /// - `Error::AllocationExhausted` when no space is left
    fn allocate(&self, size: u32) -> Result<BlockAddr>;
}

/// Bump allocator that always extends the file.
///
/// # Thread Safety
/// The next free address sits behind a `Mutex`, so concurrent writers never
/// receive overlapping blocks.
pub struct AppendAllocator {
    allocation_unit: u32,
    /// Next free address, in allocation units.
    next: Mutex<u64>,
    /// Address space limit, in allocation units.
    limit: u64,
}

impl AppendAllocator {
    /// Create an allocator for an empty file.
    ///
    /// # Panics
    /// Panics if `allocation_unit` is 0.
    pub fn new(allocation_unit: u32) -> Self {
        Self::resume(allocation_unit, 0)
    }

    /// Create an allocator for a file that is already `file_len` bytes long.
    ///
    /// A trailing partial unit is skipped, never reused.
    pub fn resume(allocation_unit: u32, file_len: u64) -> Self {
        assert!(allocation_unit > 0, "allocation_unit must be > 0");

        let unit = allocation_unit as u64;
        Self {
            allocation_unit,
            next: Mutex::new(file_len.div_ceil(unit)),
            // Addresses are u32 and INVALID is reserved.
            limit: u32::MAX as u64,
        }
    }

    /// Cap the file at `max_bytes`.
    pub fn with_max_file_size(mut self, max_bytes: u64) -> Self {
        let units = max_bytes / self.allocation_unit as u64;
        self.limit = self.limit.min(units);
        self
    }

    /// Bytes claimed so far, i.e. the logical end of the file.
    pub fn allocated_bytes(&self) -> u64 {
        *self.next.lock() * self.allocation_unit as u64
    }

    /// Bytes still available before the limit.
    pub fn available_bytes(&self) -> u64 {
        let next = *self.next.lock();
        self.limit.saturating_sub(next) * self.allocation_unit as u64
    }
}

impl BlockAllocator for AppendAllocator {
    fn allocation_unit(&self) -> u32 {
        self.allocation_unit
    }

    fn allocate(&self, size: u32) -> Result<BlockAddr> {
        if size == 0 || size % self.allocation_unit != 0 {
            return Err(Error::InvalidBlockSize {
                addr: BlockAddr::INVALID,
                size,
                reason: "not a positive multiple of the allocation unit",
            });
        }

        let units = (size / self.allocation_unit) as u64;
        let mut next = self.next.lock();

        if *next + units > self.limit {
            let available = self.limit.saturating_sub(*next) * self.allocation_unit as u64;
            return Err(Error::AllocationExhausted {
                requested: size,
                available,
            });
        }

        let addr = BlockAddr::new(*next as u32);
        *next += units;
        Ok(addr)
    }
}
