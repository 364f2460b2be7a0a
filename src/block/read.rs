//! Block read pipeline.

use log::{debug, warn};

use crate::block::BlockIo;
use crate::buffer::BlockStats;
use crate::common::config::{HEADER_SIZE, MAX_BLOCK_SIZE};
use crate::common::{BlockAddr, Error, Result};
use crate::compress::{self, CompressorError};
use crate::storage::page::{PageHeader, PageImage};

impl BlockIo {
    /// Read the block at `addr`/`size` into `buf`.
    ///
    /// The checksum is verified over all `size` bytes. If the block is
    /// compressed, its body is decompressed into a scratch buffer which then
    /// takes the place of `buf`'s contents; `buf`'s previous storage goes back
    /// to the scratch pool. The header bytes come back exactly as stored.
    ///
    /// # Errors
    /// - `Error::InvalidBlockSize` if `size` is not a whole number of
    ///   allocation units holding at least a header
    /// - `Error::BufferTooSmall` if `buf` cannot hold `size` bytes
    /// - `Error::Io` if the device read fails or comes up short
    /// - `Error::ChecksumMismatch` if the block is corrupt
    /// - `Error::Decompression` if a compressed body cannot be restored
    pub fn read_block(&self, buf: &mut PageImage, addr: BlockAddr, size: u32) -> Result<()> {
        let unit = self.config.allocation_unit;
        if (size as usize) < HEADER_SIZE || size % unit != 0 {
            return Err(Error::InvalidBlockSize {
                addr,
                size,
                reason: "not a whole number of allocation units",
            });
        }

        buf.set_len(size as usize)?;
        self.device
            .read_at(addr.to_offset(unit), buf.as_mut_slice())?;

        let header = buf.header();
        let actual = PageHeader::compute_checksum(buf.as_slice());
        if header.checksum != actual {
            BlockStats::incr(&self.stats.checksum_failures);
            warn!(
                "read checksum error: {}/{}: stored {:#010x}, computed {:#010x}",
                addr, size, header.checksum, actual
            );
            return Err(Error::ChecksumMismatch {
                addr,
                size,
                expected: header.checksum,
                actual,
            });
        }

        BlockStats::incr(&self.stats.blocks_read);
        BlockStats::add(&self.stats.bytes_read, size as u64);

        debug!(
            "read addr/size {}/{}: {}{}",
            addr,
            size,
            if header.is_compressed() { "compressed, " } else { "" },
            header.page_type()
        );

        if !header.is_compressed() {
            return Ok(());
        }

        self.decompress_into(buf, &header, addr, size)
            .inspect_err(|e| warn!("{}", e))
    }

    fn decompress_into(
        &self,
        buf: &mut PageImage,
        header: &PageHeader,
        addr: BlockAddr,
        size: u32,
    ) -> Result<()> {
        let fail = |source: CompressorError| Error::Decompression { addr, size, source };

        let compressor = self
            .compressor
            .as_deref()
            .ok_or_else(|| fail(CompressorError::NotConfigured))?;

        let memsize = header.in_memory_size;
        if (memsize as usize) < HEADER_SIZE || memsize > MAX_BLOCK_SIZE {
            return Err(fail(CompressorError::Codec {
                codec: compressor.name(),
                message: format!("implausible in-memory size {}", memsize),
            }));
        }

        let mut scratch = self.scratch.acquire(memsize as usize);
        compress::decompress_block(
            compressor,
            buf.as_slice(),
            scratch.image_mut().as_mut_slice(),
        )
        .map_err(fail)?;

        scratch.swap_with(buf);
        BlockStats::incr(&self.stats.decompressions);
        Ok(())
    }
}
