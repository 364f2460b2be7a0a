//! Pluggable block compression.
//!
//! - [`Compressor`] - The plug-in interface over byte spans
//! - [`ZstdCompressor`] / [`DeflateCompressor`] - Shipped implementations
//! - [`CompressionKind`] - Configuration-level selector
//!
//! The block layer never compresses the 32-byte header (the *skip region*);
//! the adapter functions in this module copy it verbatim and hand only the
//! body to the compressor.

mod deflate;
mod zstd_codec;

use std::sync::Arc;

use thiserror::Error;

use crate::common::config::HEADER_SIZE;
use crate::common::{Error, Result};

pub use deflate::DeflateCompressor;
pub use zstd_codec::ZstdCompressor;

/// Errors reported by a compressor plug-in.
#[derive(Debug, Error)]
pub enum CompressorError {
    /// A compressed block was read but no compressor is configured.
    #[error("block is compressed but no compressor is configured")]
    NotConfigured,

    /// The output did not fit in the destination span.
    #[error("output does not fit in {capacity} bytes")]
    NoSpace { capacity: usize },

    /// Decompression produced a different size than the header recorded.
    #[error("decompressed {actual} bytes, header expects {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The codec rejected its input.
    #[error("{codec}: {message}")]
    Codec {
        codec: &'static str,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A block compressor.
///
/// Both operations write into a caller-provided span and return the number of
/// bytes produced. Output that does not fit must be reported as an error,
/// never truncated.
pub trait Compressor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> std::result::Result<usize, CompressorError>;

    fn decompress(
        &self,
        src: &[u8],
        dst: &mut [u8],
    ) -> std::result::Result<usize, CompressorError>;
}

/// Which compressor a tree uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Store every block verbatim.
    #[default]
    None,
    /// Zstandard at the given level (0 selects the library default).
    Zstd { level: i32 },
    /// Raw deflate at the given level (0-9).
    Deflate { level: u32 },
}

impl CompressionKind {
    /// Instantiate the configured compressor, if any.
    pub fn build(&self) -> Option<Arc<dyn Compressor>> {
        match *self {
            CompressionKind::None => None,
            CompressionKind::Zstd { level } => Some(Arc::new(ZstdCompressor::new(level))),
            CompressionKind::Deflate { level } => Some(Arc::new(DeflateCompressor::new(level))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            CompressionKind::None => Ok(()),
            CompressionKind::Zstd { level } => {
                if level == 0 || zstd::compression_level_range().contains(&level) {
                    Ok(())
                } else {
                    Err(Error::InvalidConfig(format!(
                        "zstd level {} out of range",
                        level
                    )))
                }
            }
            CompressionKind::Deflate { level } => {
                if level <= 9 {
                    Ok(())
                } else {
                    Err(Error::InvalidConfig(format!(
                        "deflate level {} out of range 0-9",
                        level
                    )))
                }
            }
        }
    }
}

/// Compress a block image, leaving the skip region verbatim.
///
/// `dst` must be at least as long as the skip region. Returns the total
/// size of the compressed block (skip region plus compressor output).
pub(crate) fn compress_block(
    compressor: &dyn Compressor,
    src: &[u8],
    dst: &mut [u8],
) -> std::result::Result<usize, CompressorError> {
    dst[..HEADER_SIZE].copy_from_slice(&src[..HEADER_SIZE]);

    let body = &mut dst[HEADER_SIZE..];
    let capacity = body.len();
    let written = compressor.compress(&src[HEADER_SIZE..], body)?;
    if written > capacity {
        return Err(CompressorError::NoSpace { capacity });
    }
    Ok(HEADER_SIZE + written)
}

/// Decompress a block image into `dst`, whose length is the in-memory size.
///
/// The skip region is copied verbatim; the body must decompress to exactly
/// fill the rest of `dst`.
pub(crate) fn decompress_block(
    compressor: &dyn Compressor,
    src: &[u8],
    dst: &mut [u8],
) -> std::result::Result<(), CompressorError> {
    dst[..HEADER_SIZE].copy_from_slice(&src[..HEADER_SIZE]);

    let body = &mut dst[HEADER_SIZE..];
    let expected = body.len();
    let actual = compressor.decompress(&src[HEADER_SIZE..], body)?;
    if actual != expected {
        return Err(CompressorError::LengthMismatch { expected, actual });
    }
    Ok(())
}
