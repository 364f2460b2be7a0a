//! treeblock - the on-disk block codec of a B-tree storage engine.
//!
//! Every page image passes through this crate on its way to and from the
//! file. A block is an aligned, checksummed, optionally compressed page
//! image whose first 32 bytes are always readable without decompression.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        B-tree / eviction                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                 PageImage ↓             ↑ PageImage
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Block Layer (block/)                                           │
//! │     BlockIo::write_block            BlockIo::read_block         │
//! │  ┌───────────────┐ ┌────────────────┐ ┌──────────────────────┐  │
//! │  │  compress/    │ │  buffer/       │ │  PageVerifier        │  │
//! │  │  zstd|deflate │ │  ScratchPool   │ │  (structural gate)   │  │
//! │  └───────────────┘ └────────────────┘ └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              ↓ ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Storage Layer (storage/)                                       │
//! │   BlockDevice + BlockAllocator + WriteSequence + PageHeader     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Block format
//! ```text
//! offset 0   u32  checksum        (zeroed during its own computation)
//! offset 4   u32  on_disk_size
//! offset 8   u32  in_memory_size  (== on_disk_size ⇔ uncompressed)
//! offset 12  u64  write_sequence
//! offset 20  u8   page_type
//! offset 21..31   reserved
//! offset 32..     payload, then zero padding to the allocation unit
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockAddr, Error, config)
//! - [`storage`] - Devices, allocation, write sequence, page formats
//! - [`buffer`] - Scratch buffers and statistics
//! - [`compress`] - Compressor plug-ins
//! - [`block`] - The read and write pipelines
//!
//! # Quick Start
//! ```no_run
//! use treeblock::{BlockConfig, BlockIo, CompressionKind, PageImage, PageType};
//!
//! let config = BlockConfig::default().with_compression(CompressionKind::Zstd { level: 3 });
//! let io = BlockIo::open_file("my_tree.db", config).unwrap();
//!
//! let mut page = io.new_image(PageType::BTreeLeaf, b"hello");
//! let block = io.write_block(&mut page).unwrap();
//!
//! let mut buf = PageImage::with_capacity(block.size as usize);
//! io.read_block(&mut buf, block.addr, block.size).unwrap();
//! ```

pub mod block;
pub mod buffer;
pub mod common;
pub mod compress;
pub mod storage;

pub use common::config::{BlockConfig, HEADER_SIZE};
pub use common::{BlockAddr, Error, Result};

pub use block::{BlockIo, HeaderVerifier, PageVerifier, WrittenBlock};
pub use buffer::{BlockStats, ScratchBuffer, ScratchPool, StatsSnapshot};
pub use compress::{
    CompressionKind, Compressor, CompressorError, DeflateCompressor, ZstdCompressor,
};
pub use storage::page::{PageHeader, PageImage, PageType};
pub use storage::{
    AppendAllocator, BlockAllocator, BlockDevice, FileDevice, MemoryDevice, WriteSequence,
};
