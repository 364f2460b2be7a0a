use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::{Compressor, CompressorError};

/// Raw deflate (no zlib/gzip framing) block compressor.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCompressor {
    level: u32,
}

impl DeflateCompressor {
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new(Compression::default().level())
    }
}

impl Compressor for DeflateCompressor {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        let mut stream = Compress::new(Compression::new(self.level), false);
        match stream.compress(src, dst, FlushCompress::Finish) {
            Ok(Status::StreamEnd) => Ok(stream.total_out() as usize),
            // The stream only ends once all output fit.
            Ok(_) => Err(CompressorError::NoSpace {
                capacity: dst.len(),
            }),
            Err(e) => Err(CompressorError::Codec {
                codec: "deflate",
                message: e.to_string(),
            }),
        }
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        let mut stream = Decompress::new(false);
        match stream.decompress(src, dst, FlushDecompress::Finish) {
            Ok(Status::StreamEnd) => Ok(stream.total_out() as usize),
            Ok(_) => Err(CompressorError::Codec {
                codec: "deflate",
                message: format!(
                    "stream did not end after {} input bytes",
                    stream.total_in()
                ),
            }),
            Err(e) => Err(CompressorError::Codec {
                codec: "deflate",
                message: e.to_string(),
            }),
        }
    }
}
