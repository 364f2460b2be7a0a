//! Block write pipeline.
//!
//! ```text
//! Unverified → Verified ─┬─────────────────────────────┬→ Uncompressed ─┐
//!                        └→ CompressionAttempted ─┬────┘ (abandoned)    │
//!                                                 └→ Adopted ───────────┤
//!        Persisted ← Checksummed ← Sequenced ← Allocated ←──────────────┘
//! ```
//! Any failure ends the write; a scratch buffer held at that point is
//! released by its guard.

use log::debug;

use crate::block::{BlockIo, WrittenBlock};
use crate::buffer::{BlockStats, ScratchBuffer};
use crate::common::config::{HEADER_SIZE, MAX_BLOCK_SIZE};
use crate::common::{BlockAddr, Error, Result};
use crate::compress::{self, Compressor, CompressorError};
use crate::storage::page::PageImage;

/// Result of one compression attempt.
enum CompressOutcome<'a> {
    /// The compressed block is smaller after alignment; the scratch image is
    /// fully prepared apart from sequence and checksum.
    Adopted(ScratchBuffer<'a>),
    /// Compression worked but saved no allocation units.
    NotBeneficial { compressed: u32, aligned: u32 },
    /// The compressor gave up.
    Failed(CompressorError),
}

impl BlockIo {
    /// Write a page image as a new block and return where it landed.
    ///
    /// `image` holds an uncompressed, unaligned page whose header is filled
    /// in apart from the sizes, write sequence and checksum. Its capacity
    /// must reach the next allocation boundary (see [`BlockIo::new_image`]):
    /// an uncompressed block is zero-padded in place.
    ///
    /// On return `image` holds the padded block if it was stored
    /// uncompressed. If the compressed form was stored, `image` keeps its
    /// original bytes and the compressed block lived in a scratch buffer.
    ///
    /// A compressor that fails or saves nothing never fails the write.
    ///
    /// # Errors
    /// - `Error::InvalidBlockSize` if the image is shorter than a header or
    ///   larger than the format allows
    /// - `Error::StructuralVerification` if the verifier rejects the page
    /// - `Error::BufferTooSmall` if `image` cannot be padded in place
    /// - `Error::AllocationExhausted` if no space is left
    /// - `Error::Io` if the device write or sync fails
    pub fn write_block(&self, image: &mut PageImage) -> Result<WrittenBlock> {
        let len = image.len();
        if len < HEADER_SIZE || len > MAX_BLOCK_SIZE as usize {
            return Err(Error::InvalidBlockSize {
                addr: BlockAddr::INVALID,
                size: len.min(u32::MAX as usize) as u32,
                reason: "page image must hold a header and fit the block format",
            });
        }
        let orig_size = len as u32;
        let page_type = image.page_type();

        // The verifier sees the image as if it were written uncompressed.
        image.set_sizes(orig_size, orig_size);
        self.verifier
            .verify(image.as_slice(), BlockAddr::INVALID, orig_size)?;

        let unit = self.config.allocation_unit;
        let align_size = self.config.align(orig_size);

        let mut adopted = None;
        if let Some(compressor) = self.compressor.as_deref() {
            if align_size != unit {
                match self.try_compress(compressor, image, align_size)? {
                    CompressOutcome::Adopted(scratch) => adopted = Some(scratch),
                    CompressOutcome::NotBeneficial { compressed, aligned } => {
                        BlockStats::incr(&self.stats.compression_fallbacks);
                        debug!(
                            "{}: {} -> {} bytes ({} aligned) saves nothing over {}, writing uncompressed",
                            compressor.name(),
                            orig_size,
                            compressed,
                            aligned,
                            align_size
                        );
                    }
                    CompressOutcome::Failed(e) => {
                        BlockStats::incr(&self.stats.compression_fallbacks);
                        debug!(
                            "{}: compression of {} bytes failed ({}), writing uncompressed",
                            compressor.name(),
                            orig_size,
                            e
                        );
                    }
                }
            }
        }

        let compressed = adopted.is_some();
        let block: &mut PageImage = match adopted.as_mut() {
            Some(scratch) => scratch.image_mut(),
            None => {
                image.zero_pad_to(align_size as usize)?;
                // Equal sizes mark the block as stored verbatim.
                image.set_sizes(align_size, align_size);
                image
            }
        };
        let size = block.len() as u32;

        let addr = self.allocator.allocate(size)?;

        let write_sequence = self.write_sequence.next();
        block.set_write_sequence(write_sequence);
        block.update_checksum();

        self.device.write_at(addr.to_offset(unit), block.as_slice())?;
        if self.config.sync_on_write {
            self.device.sync()?;
        }

        BlockStats::incr(&self.stats.blocks_written);
        BlockStats::add(&self.stats.bytes_written, size as u64);
        if compressed {
            BlockStats::incr(&self.stats.compressed_writes);
        }

        debug!(
            "write {} at addr/size {}/{}, {}{} (seq {})",
            orig_size,
            addr,
            size,
            if compressed { "compressed, " } else { "" },
            page_type,
            write_sequence
        );

        Ok(WrittenBlock {
            addr,
            size,
            write_sequence,
            compressed,
        })
    }

    /// Compress `image` into a scratch buffer and decide whether to keep it.
    ///
    /// The scratch buffer is only as large as the uncompressed image: output
    /// that would not fit is useless anyway.
    fn try_compress(
        &self,
        compressor: &dyn Compressor,
        image: &PageImage,
        align_size: u32,
    ) -> Result<CompressOutcome<'_>> {
        let orig_size = image.len();
        let mut scratch = self.scratch.acquire(orig_size);

        let total = match compress::compress_block(
            compressor,
            image.as_slice(),
            scratch.image_mut().as_mut_slice(),
        ) {
            Ok(total) => total as u32,
            Err(e) => return Ok(CompressOutcome::Failed(e)),
        };

        let candidate = self.config.align(total);
        if candidate >= align_size {
            return Ok(CompressOutcome::NotBeneficial {
                compressed: total,
                aligned: candidate,
            });
        }

        // candidate < align_size implies candidate < orig_size, so the
        // padding fits in the scratch buffer.
        let block = scratch.image_mut();
        block.set_len(total as usize)?;
        block.zero_pad_to(candidate as usize)?;
        block.set_sizes(candidate, orig_size as u32);

        Ok(CompressOutcome::Adopted(scratch))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::block::PageVerifier;
    use crate::common::config::BlockConfig;
    use crate::compress::{CompressionKind, ZstdCompressor};
    use crate::storage::page::{PageHeader, PageType};
    use crate::storage::{AppendAllocator, MemoryDevice};

    struct FailingCompressor;

    impl Compressor for FailingCompressor {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn compress(
            &self,
            _src: &[u8],
            _dst: &mut [u8],
        ) -> std::result::Result<usize, CompressorError> {
            Err(CompressorError::NoSpace { capacity: 0 })
        }

        fn decompress(
            &self,
            _src: &[u8],
            _dst: &mut [u8],
        ) -> std::result::Result<usize, CompressorError> {
            Err(CompressorError::NotConfigured)
        }
    }

    struct RejectAll;

    impl PageVerifier for RejectAll {
        fn verify(&self, _image: &[u8], addr: BlockAddr, size: u32) -> Result<()> {
            Err(Error::StructuralVerification {
                addr,
                size,
                reason: "rejected".into(),
            })
        }
    }

    fn setup(unit: u32) -> (BlockIo, Arc<MemoryDevice>) {
        let device = Arc::new(MemoryDevice::new());
        let io = BlockIo::new(
            BlockConfig::default()
                .with_allocation_unit(unit)
                .with_sync_on_write(false),
            device.clone(),
            Arc::new(AppendAllocator::new(unit)),
        )
        .unwrap();
        (io, device)
    }

    #[test]
    fn test_uncompressed_write_pads_in_place() {
        let (io, dev) = setup(512);
        let mut image = io.new_image(PageType::BTreeLeaf, &[0xAB; 100]);

        let block = io.write_block(&mut image).unwrap();

        assert_eq!(block.addr, BlockAddr::new(0));
        assert_eq!(block.size, 512);
        assert!(!block.compressed);
        assert_eq!(image.len(), 512);

        let header = image.header();
        assert_eq!(header.on_disk_size, 512);
        assert_eq!(header.in_memory_size, 512);
        assert_eq!(header.write_sequence, 1);

        let disk = dev.snapshot();
        assert_eq!(disk.len(), 512);
        assert_eq!(&disk[..], image.as_slice());
        assert!(disk[132..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_checksum_covers_whole_block() {
        let (io, dev) = setup(512);
        io.write_block(&mut io.new_image(PageType::BTreeLeaf, b"xyz"))
            .unwrap();

        let disk = dev.snapshot();
        let header = PageHeader::from_bytes(&disk);
        assert_eq!(header.checksum, PageHeader::compute_checksum(&disk));
    }

    #[test]
    fn test_single_unit_page_skips_compression() {
        let (io, _dev) = setup(512);
        let io = io.with_compressor(Arc::new(FailingCompressor));

        io.write_block(&mut io.new_image(PageType::BTreeLeaf, &[0u8; 100]))
            .unwrap();

        // Never attempted, so not counted as a fallback.
        assert_eq!(io.stats().snapshot().compression_fallbacks, 0);
        assert_eq!(io.scratch_pool().acquisitions(), 0);
    }

    #[test]
    fn test_failing_compressor_falls_back() {
        let (io, _dev) = setup(64);
        let io = io.with_compressor(Arc::new(FailingCompressor));
        let mut image = io.new_image(PageType::BTreeLeaf, &[0u8; 568]);

        let block = io.write_block(&mut image).unwrap();

        assert!(!block.compressed);
        assert_eq!(block.size, 640);
        assert_eq!(image.header().in_memory_size, 640);
        assert_eq!(io.stats().snapshot().compression_fallbacks, 1);
        assert_eq!(io.scratch_pool().outstanding(), 0);
    }

    #[test]
    fn test_compressed_write_keeps_caller_image() {
        let (io, dev) = setup(64);
        let io = io.with_compressor(Arc::new(ZstdCompressor::default()));
        let mut image = io.new_image(PageType::BTreeLeaf, &[0u8; 568]);

        let block = io.write_block(&mut image).unwrap();

        assert!(block.compressed);
        assert_eq!(block.size, 64);
        assert_eq!(image.len(), 600);

        let disk = dev.snapshot();
        let header = PageHeader::from_bytes(&disk);
        assert_eq!(header.on_disk_size, 64);
        assert_eq!(header.in_memory_size, 600);
        assert_eq!(header.page_type(), PageType::BTreeLeaf);
        assert_eq!(io.scratch_pool().outstanding(), 0);
        assert_eq!(io.stats().snapshot().compressed_writes, 1);
    }

    #[test]
    fn test_verifier_failure_writes_nothing() {
        let (io, dev) = setup(512);
        let io = io.with_verifier(Box::new(RejectAll));

        let err = io
            .write_block(&mut io.new_image(PageType::BTreeLeaf, b"x"))
            .unwrap_err();

        assert!(matches!(err, Error::StructuralVerification { .. }));
        assert!(dev.snapshot().is_empty());
        assert_eq!(io.write_sequence().current(), 0);
    }

    #[test]
    fn test_invalid_page_type_is_rejected() {
        let (io, _dev) = setup(512);
        let err = io
            .write_block(&mut io.new_image(PageType::Invalid, b"x"))
            .unwrap_err();
        assert!(matches!(err, Error::StructuralVerification { .. }));
    }

    #[test]
    fn test_image_shorter_than_header() {
        let (io, _dev) = setup(512);
        let mut image = PageImage::with_capacity(512);
        image.set_len(10).unwrap();

        let err = io.write_block(&mut image).unwrap_err();
        assert!(matches!(err, Error::InvalidBlockSize { size: 10, .. }));
    }

    #[test]
    fn test_unpadded_capacity_is_rejected() {
        let (io, _dev) = setup(512);
        let mut image = PageImage::with_capacity(132);
        image.set_len(132).unwrap();
        image.set_header(&PageHeader::new(PageType::BTreeLeaf));

        let err = io.write_block(&mut image).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooSmall {
                needed: 512,
                available: 132
            }
        ));
    }

    #[test]
    fn test_allocation_failure_surfaces() {
        let device = Arc::new(MemoryDevice::new());
        let io = BlockIo::new(
            BlockConfig::default().with_allocation_unit(512),
            device.clone(),
            Arc::new(AppendAllocator::new(512).with_max_file_size(512)),
        )
        .unwrap();

        io.write_block(&mut io.new_image(PageType::BTreeLeaf, b"a"))
            .unwrap();
        let err = io
            .write_block(&mut io.new_image(PageType::BTreeLeaf, b"b"))
            .unwrap_err();

        assert!(matches!(err, Error::AllocationExhausted { requested: 512, .. }));
        assert_eq!(device.snapshot().len(), 512);
    }

    #[test]
    fn test_compression_kind_none_never_compresses() {
        let device = Arc::new(MemoryDevice::new());
        let io = BlockIo::new(
            BlockConfig::default()
                .with_allocation_unit(64)
                .with_compression(CompressionKind::None),
            device,
            Arc::new(AppendAllocator::new(64)),
        )
        .unwrap();

        let block = io
            .write_block(&mut io.new_image(PageType::BTreeLeaf, &[0u8; 4000]))
            .unwrap();
        assert!(!block.compressed);
        assert_eq!(block.size, 4032);
    }
}
