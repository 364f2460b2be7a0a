//! Configuration for the block layer.
//!
//! Compile-time constants describe the on-disk format; [`BlockConfig`] holds
//! the per-tree runtime settings.

use crate::common::{Error, Result};
use crate::compress::CompressionKind;

/// Size of the block header in bytes.
///
/// The header is also the compression skip region: bytes `[0, HEADER_SIZE)`
/// of every block are stored verbatim so the checksum, both sizes and the
/// page type can be read without decompressing anything.
pub const HEADER_SIZE: usize = 32;

/// Default allocation unit (512 bytes, one classic disk sector).
pub const DEFAULT_ALLOCATION_UNIT: u32 = 512;

/// Largest block the format can describe.
///
/// Sizes are stored as `u32`; capping at 2GB keeps `align` from overflowing.
pub const MAX_BLOCK_SIZE: u32 = 1 << 31;

/// Default number of idle scratch buffers kept for reuse.
pub const DEFAULT_SCRATCH_POOL_LIMIT: usize = 16;

/// Round `size` up to the next multiple of `unit`.
///
/// `unit` must be a power of two, and both `size` and `unit` must be at most
/// [`MAX_BLOCK_SIZE`]; within those bounds the sum cannot overflow `u32`.
/// Callers check image lengths against `MAX_BLOCK_SIZE` before aligning.
#[inline]
pub const fn align_to(size: u32, unit: u32) -> u32 {
    (size + unit - 1) & !(unit - 1)
}

/// Runtime configuration of one tree's block layer.
///
/// # Example
/// ```
/// use treeblock::{BlockConfig, CompressionKind};
///
/// let config = BlockConfig::default()
///     .with_allocation_unit(4096)
///     .with_compression(CompressionKind::Zstd { level: 3 });
/// assert!(config.validate().is_ok());
/// assert_eq!(config.align(100), 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockConfig {
    /// Granularity every block size and address is expressed in.
    pub allocation_unit: u32,
    /// Which compressor (if any) the write pipeline tries.
    pub compression: CompressionKind,
    /// Call `fsync` after every block write.
    pub sync_on_write: bool,
    /// Idle scratch buffers retained by the pool.
    pub scratch_pool_limit: usize,
    /// Upper bound on the file size the allocator may grow to.
    pub max_file_size: Option<u64>,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            allocation_unit: DEFAULT_ALLOCATION_UNIT,
            compression: CompressionKind::None,
            sync_on_write: true,
            scratch_pool_limit: DEFAULT_SCRATCH_POOL_LIMIT,
            max_file_size: None,
        }
    }
}

impl BlockConfig {
    pub fn with_allocation_unit(mut self, unit: u32) -> Self {
        self.allocation_unit = unit;
        self
    }

    pub fn with_compression(mut self, kind: CompressionKind) -> Self {
        self.compression = kind;
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    pub fn with_scratch_pool_limit(mut self, limit: usize) -> Self {
        self.scratch_pool_limit = limit;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Check the configuration for values the block format cannot support.
    pub fn validate(&self) -> Result<()> {
        let unit = self.allocation_unit;
        if !unit.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "allocation unit {} is not a power of two",
                unit
            )));
        }
        if (unit as usize) < HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "allocation unit {} is smaller than the {}-byte block header",
                unit, HEADER_SIZE
            )));
        }
        if unit > MAX_BLOCK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "allocation unit {} exceeds the maximum block size {}",
                unit, MAX_BLOCK_SIZE
            )));
        }
        self.compression.validate()
    }

    /// Round `size` up to this configuration's allocation unit.
    #[inline]
    pub fn align(&self, size: u32) -> u32 {
        align_to(size, self.allocation_unit)
    }
}
