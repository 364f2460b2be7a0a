//! Error types for the block layer.

use thiserror::Error;

use crate::common::BlockAddr;
use crate::compress::CompressorError;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the block read and write pipelines can surface.
///
/// Compression failures on write are absorbed (the block is written
/// uncompressed) and therefore have no variant here; a failing compressor
/// only becomes visible as the `source` of [`Error::Decompression`].
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the block device, including short reads.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored checksum does not match the block contents.
    ///
    /// This is file corruption and is never retried.
    #[error("read checksum error at {addr}/{size}: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        addr: BlockAddr,
        size: u32,
        expected: u32,
        actual: u32,
    },

    /// A compressed block could not be decompressed.
    #[error("decompression failed at {addr}/{size}: {source}")]
    Decompression {
        addr: BlockAddr,
        size: u32,
        #[source]
        source: CompressorError,
    },

    /// The page image failed the structural check before write.
    ///
    /// This indicates a bug in the code that built the page.
    #[error("structural verification failed at {addr}/{size}: {reason}")]
    StructuralVerification {
        addr: BlockAddr,
        size: u32,
        reason: String,
    },

    /// The allocator has no room for a block of the requested size.
    #[error("allocation exhausted: requested {requested} bytes, {available} available")]
    AllocationExhausted { requested: u32, available: u64 },

    /// A caller-supplied buffer is smaller than the operation needs.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// The requested block size cannot describe a valid block.
    #[error("invalid block size {size} at {addr}: {reason}")]
    InvalidBlockSize {
        addr: BlockAddr,
        size: u32,
        reason: &'static str,
    },

    /// Configuration rejected by [`BlockConfig::validate`](crate::BlockConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error means the file contents are corrupt.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::ChecksumMismatch { .. } | Error::Decompression { .. }
        )
    }
}
