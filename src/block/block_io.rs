//! BlockIo - one tree's handle on its file.
//!
//! [`BlockIo`] bundles the collaborators the read and write pipelines need:
//! device, allocator, compressor, verifier, write sequence and the scratch
//! pool. The pipelines themselves live in `read.rs` and `write.rs`.

use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::block::verify::{HeaderVerifier, PageVerifier};
use crate::buffer::{BlockStats, ScratchPool};
use crate::common::config::{BlockConfig, HEADER_SIZE};
use crate::common::{BlockAddr, Error, Result};
use crate::compress::Compressor;
use crate::storage::page::{PageHeader, PageImage, PageType};
use crate::storage::{AppendAllocator, BlockAllocator, BlockDevice, FileDevice, WriteSequence};

/// Where a block landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenBlock {
    pub addr: BlockAddr,
    /// On-disk size, a multiple of the allocation unit.
    pub size: u32,
    pub write_sequence: u64,
    /// Whether the compressed form was stored.
    pub compressed: bool,
}

/// Reads and writes page images as checksummed, aligned blocks.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────────┐
/// │                         BlockIo                           │
/// │  write_block: verify → align → compress? → allocate →     │
/// │               sequence → checksum → write                 │
/// │  read_block:  read → checksum → decompress? → swap        │
/// │  ┌──────────┐ ┌───────────┐ ┌────────────┐ ┌───────────┐  │
/// │  │  device  │ │ allocator │ │ compressor │ │  scratch  │  │
/// │  └──────────┘ └───────────┘ └────────────┘ └───────────┘  │
/// └───────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// `BlockIo` is `Send + Sync`. Reads and writes of different blocks may run
/// on several threads at once; the allocator and write sequence serialize
/// themselves. Callers must not write the same address concurrently.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use treeblock::{AppendAllocator, BlockConfig, BlockIo, MemoryDevice, PageImage, PageType};
///
/// let config = BlockConfig::default().with_allocation_unit(512);
/// let io = BlockIo::new(
///     config,
///     Arc::new(MemoryDevice::new()),
///     Arc::new(AppendAllocator::new(512)),
/// )?;
///
/// let mut page = io.new_image(PageType::BTreeLeaf, b"payload");
/// let block = io.write_block(&mut page)?;
/// assert_eq!(block.size, 512);
///
/// let mut buf = PageImage::with_capacity(block.size as usize);
/// io.read_block(&mut buf, block.addr, block.size)?;
/// assert_eq!(&buf.payload()[..7], b"payload");
/// # Ok::<(), treeblock::Error>(())
/// ```
pub struct BlockIo {
    pub(crate) config: BlockConfig,
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) allocator: Arc<dyn BlockAllocator>,
    pub(crate) compressor: Option<Arc<dyn Compressor>>,
    pub(crate) verifier: Box<dyn PageVerifier>,
    pub(crate) write_sequence: Arc<WriteSequence>,
    pub(crate) scratch: ScratchPool,
    pub(crate) stats: BlockStats,
}

impl BlockIo {
    /// Create a block layer over the given device and allocator.
    ///
    /// The compressor is built from `config.compression`; the verifier
    /// defaults to [`HeaderVerifier`] and the write sequence starts at 0.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the configuration is rejected or the
    /// allocator counts addresses in a different unit.
    pub fn new(
        config: BlockConfig,
        device: Arc<dyn BlockDevice>,
        allocator: Arc<dyn BlockAllocator>,
    ) -> Result<Self> {
        config.validate()?;
        if allocator.allocation_unit() != config.allocation_unit {
            return Err(Error::InvalidConfig(format!(
                "allocator unit {} does not match allocation_unit {}",
                allocator.allocation_unit(),
                config.allocation_unit
            )));
        }

        Ok(Self {
            compressor: config.compression.build(),
            scratch: ScratchPool::new(config.scratch_pool_limit),
            config,
            device,
            allocator,
            verifier: Box::new(HeaderVerifier),
            write_sequence: Arc::new(WriteSequence::new()),
            stats: BlockStats::new(),
        })
    }

    /// Open (or create) a single-file tree.
    ///
    /// Allocation resumes at the end of the file and the write sequence
    /// resumes after the largest sequence found in the existing blocks.
    pub fn open_file<P: AsRef<Path>>(path: P, config: BlockConfig) -> Result<Self> {
        config.validate()?;

        let device = Arc::new(FileDevice::open_or_create(path)?);
        let mut allocator = AppendAllocator::resume(config.allocation_unit, device.len()?);
        if let Some(max) = config.max_file_size {
            allocator = allocator.with_max_file_size(max);
        }

        let io = Self::new(config, device, Arc::new(allocator))?;

        let blocks = io.scan_headers()?;
        let max_seen = blocks
            .iter()
            .map(|(_, header)| header.write_sequence)
            .max()
            .unwrap_or(0);
        io.write_sequence.observe(max_seen);

        debug!(
            "opened file: {} blocks, write sequence resumes after {}",
            blocks.len(),
            max_seen
        );
        Ok(io)
    }

    /// Use `compressor` instead of the one named in the configuration.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn with_verifier(mut self, verifier: Box<dyn PageVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Share the tree's write sequence with this block layer.
    pub fn with_write_sequence(mut self, sequence: Arc<WriteSequence>) -> Self {
        self.write_sequence = sequence;
        self
    }

    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    pub fn stats(&self) -> &BlockStats {
        &self.stats
    }

    pub fn scratch_pool(&self) -> &ScratchPool {
        &self.scratch
    }

    pub fn write_sequence(&self) -> &Arc<WriteSequence> {
        &self.write_sequence
    }

    pub fn compressor(&self) -> Option<&dyn Compressor> {
        self.compressor.as_deref()
    }

    /// Build a page image whose capacity covers the aligned block size.
    pub fn new_image(&self, page_type: PageType, payload: &[u8]) -> PageImage {
        PageImage::new(page_type, payload, self.config.allocation_unit)
    }

    /// Read only the header of the block at `addr`.
    ///
    /// Nothing is decompressed and the checksum is not checked.
    pub fn peek_header(&self, addr: BlockAddr) -> Result<PageHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        self.device
            .read_at(addr.to_offset(self.config.allocation_unit), &mut raw)?;
        Ok(PageHeader::from_bytes(&raw))
    }

    /// Walk the file front to back and collect every intact block header.
    ///
    /// A candidate is accepted if its page type is set, its on-disk size is
    /// a whole number of allocation units that fits in the file, and the
    /// block's checksum matches. Anything else is skipped one allocation
    /// unit at a time, so a damaged size field cannot hide the blocks after
    /// it.
    pub fn scan_headers(&self) -> Result<Vec<(BlockAddr, PageHeader)>> {
        let unit = self.config.allocation_unit as u64;
        let end = self.device.len()?;

        let mut found = Vec::new();
        let mut block = Vec::new();
        let mut offset = 0u64;
        while offset + HEADER_SIZE as u64 <= end {
            let addr = BlockAddr::new((offset / unit) as u32);
            let header = self.peek_header(addr)?;
            let size = header.on_disk_size as u64;

            let plausible = header.page_type() != PageType::Invalid
                && size >= HEADER_SIZE as u64
                && size % unit == 0
                && offset + size <= end;

            if plausible {
                block.resize(size as usize, 0);
                self.device.read_at(offset, &mut block)?;
                if header.verify_checksum(&block) {
                    found.push((addr, header));
                    offset += size;
                    continue;
                }
                debug!("scan: skipping damaged block at {}/{}", addr, size);
            }
            offset += unit;
        }
        Ok(found)
    }
}
