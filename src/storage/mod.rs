//! Storage layer - devices, allocation and page formats.
//!
//! - [`BlockDevice`] - Positional file I/O ([`FileDevice`], [`MemoryDevice`])
//! - [`BlockAllocator`] - Claims file space ([`AppendAllocator`])
//! - [`WriteSequence`] - Per-tree monotonic write counter
//! - [`page`] - Page image and block header layout

mod allocator;
mod device;
pub mod page;
mod write_sequence;

pub use allocator::{AppendAllocator, BlockAllocator};
pub use device::{BlockDevice, FileDevice, MemoryDevice};
pub use write_sequence::WriteSequence;
