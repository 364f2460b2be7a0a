use super::{Compressor, CompressorError};

/// Zstandard block compressor.
///
/// Uses the single-shot bulk API: each block is an independent frame, so
/// any block can be decompressed without its neighbours.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        Ok(zstd::bulk::compress_to_buffer(src, dst, self.level)?)
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        // Blocks are zero-padded to the allocation unit; zstd would read the
        // padding as a second, malformed frame.
        let frame_len = zstd::zstd_safe::find_frame_compressed_size(src).map_err(|code| {
            CompressorError::Codec {
                codec: "zstd",
                message: zstd::zstd_safe::get_error_name(code).to_string(),
            }
        })?;
        Ok(zstd::bulk::decompress_to_buffer(&src[..frame_len], dst)?)
    }
}
