//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use treeblock::{
    AppendAllocator, BlockConfig, BlockDevice, BlockIo, Compressor, CompressorError,
    MemoryDevice,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Block layer over an in-memory device; also returns the device so tests
/// can inspect or corrupt raw bytes.
pub fn memory_io(config: BlockConfig) -> (BlockIo, Arc<MemoryDevice>) {
    init_logging();
    let device = Arc::new(MemoryDevice::new());
    let allocator = Arc::new(AppendAllocator::new(config.allocation_unit));
    let io = BlockIo::new(config, device.clone(), allocator).unwrap();
    (io, device)
}

/// Compressor that refuses every input.
pub struct AlwaysFail;

impl Compressor for AlwaysFail {
    fn name(&self) -> &'static str {
        "always-fail"
    }

    fn compress(&self, _src: &[u8], _dst: &mut [u8]) -> Result<usize, CompressorError> {
        Err(CompressorError::Codec {
            codec: "always-fail",
            message: "refused".into(),
        })
    }

    fn decompress(&self, _src: &[u8], _dst: &mut [u8]) -> Result<usize, CompressorError> {
        Err(CompressorError::Codec {
            codec: "always-fail",
            message: "refused".into(),
        })
    }
}

/// Encodes a body made of one repeated byte into exactly `output_len`
/// bytes: `[byte, len as u32 LE, zero padding]`. Anything else fails.
pub struct UniformRun {
    pub output_len: usize,
}

impl Compressor for UniformRun {
    fn name(&self) -> &'static str {
        "uniform-run"
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        let Some(&first) = src.first() else {
            return Err(CompressorError::Codec {
                codec: "uniform-run",
                message: "empty input".into(),
            });
        };
        if src.iter().any(|&b| b != first) {
            return Err(CompressorError::Codec {
                codec: "uniform-run",
                message: "input is not a single run".into(),
            });
        }
        if dst.len() < self.output_len {
            return Err(CompressorError::NoSpace {
                capacity: dst.len(),
            });
        }

        dst[0] = first;
        dst[1..5].copy_from_slice(&(src.len() as u32).to_le_bytes());
        dst[5..self.output_len].fill(0);
        Ok(self.output_len)
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        if src.len() < 5 {
            return Err(CompressorError::Codec {
                codec: "uniform-run",
                message: "truncated run".into(),
            });
        }
        let len = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > dst.len() {
            return Err(CompressorError::NoSpace {
                capacity: dst.len(),
            });
        }
        dst[..len].fill(src[0]);
        Ok(len)
    }
}

/// Wraps a compressor and counts calls.
pub struct Counting<C> {
    pub inner: C,
    pub compress_calls: AtomicUsize,
    pub decompress_calls: AtomicUsize,
}

impl<C> Counting<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            compress_calls: AtomicUsize::new(0),
            decompress_calls: AtomicUsize::new(0),
        }
    }

    pub fn compress_calls(&self) -> usize {
        self.compress_calls.load(Ordering::Relaxed)
    }

    pub fn decompress_calls(&self) -> usize {
        self.decompress_calls.load(Ordering::Relaxed)
    }
}

impl<C: Compressor> Compressor for Counting<C> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        self.compress_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.compress(src, dst)
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CompressorError> {
        self.decompress_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.decompress(src, dst)
    }
}

/// Device whose writes always fail; reads go to an empty memory device.
#[derive(Default)]
pub struct FailingWrites {
    inner: MemoryDevice,
}

impl BlockDevice for FailingWrites {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> treeblock::Result<()> {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&self, _offset: u64, _data: &[u8]) -> treeblock::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into())
    }

    fn sync(&self) -> treeblock::Result<()> {
        Ok(())
    }

    fn len(&self) -> treeblock::Result<u64> {
        self.inner.len()
    }
}
