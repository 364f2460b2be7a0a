//! Block header and page type definitions.
//!
//! Every block starts with a 32-byte [`PageHeader`] that is never compressed:
//! - CRC32 checksum of the whole on-disk block
//! - on-disk and in-memory sizes (unequal sizes mean "compressed")
//! - write sequence for ordering versions of the same page
//! - [`PageType`] discriminator

use std::fmt;

use crate::common::config::HEADER_SIZE;

/// Type of page stored in a block.
///
/// The header stores the raw byte; this enum exists for routing and
/// diagnostics. Unknown values are preserved through [`PageType::Other`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid,
    /// B-tree internal (non-leaf) node.
    BTreeInternal,
    /// B-tree leaf node.
    BTreeLeaf,
    /// Overflow item too large for a leaf.
    Overflow,
    /// Page on the free list.
    Free,
    /// A discriminator this crate has no name for.
    Other(u8),
}

impl PageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => PageType::Invalid,
            1 => PageType::BTreeInternal,
            2 => PageType::BTreeLeaf,
            3 => PageType::Overflow,
            4 => PageType::Free,
            other => PageType::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PageType::Invalid => 0,
            PageType::BTreeInternal => 1,
            PageType::BTreeLeaf => 2,
            PageType::Overflow => 3,
            PageType::Free => 4,
            PageType::Other(v) => v,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageType::Invalid => write!(f, "invalid"),
            PageType::BTreeInternal => write!(f, "internal"),
            PageType::BTreeLeaf => write!(f, "leaf"),
            PageType::Overflow => write!(f, "overflow"),
            PageType::Free => write!(f, "free"),
            PageType::Other(v) => write!(f, "unknown({})", v),
        }
    }
}

/// Metadata stored at the beginning of every block.
///
/// # Layout (32 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     checksum (CRC32 of the on-disk block)
/// 4       4     on_disk_size
/// 8       4     in_memory_size
/// 12      8     write_sequence
/// 20      1     page_type
/// 21      11    reserved (zero)
/// ```
///
/// # Checksum
/// The checksum covers exactly `on_disk_size` bytes (the aligned block as it
/// sits in the file, compressed bytes and padding included) with the checksum
/// field itself set to zero.
///
/// # Compression flag
/// `on_disk_size == in_memory_size` means the block is stored verbatim.
/// Otherwise `in_memory_size` is the size of the buffer needed to hold the
/// decompressed image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub checksum: u32,
    pub on_disk_size: u32,
    pub in_memory_size: u32,
    pub write_sequence: u64,
    /// Raw page type byte; see [`PageHeader::page_type`].
    pub page_type: u8,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = HEADER_SIZE;

    pub const OFFSET_CHECKSUM: usize = 0;
    pub const OFFSET_ON_DISK_SIZE: usize = 4;
    pub const OFFSET_IN_MEMORY_SIZE: usize = 8;
    pub const OFFSET_WRITE_SEQUENCE: usize = 12;
    pub const OFFSET_PAGE_TYPE: usize = 20;
    pub const OFFSET_RESERVED: usize = 21;

    /// Create a new header with the given page type and everything else zero.
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type: page_type.as_u8(),
            ..Self::default()
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        Self {
            checksum: read_u32(data, Self::OFFSET_CHECKSUM),
            on_disk_size: read_u32(data, Self::OFFSET_ON_DISK_SIZE),
            in_memory_size: read_u32(data, Self::OFFSET_IN_MEMORY_SIZE),
            write_sequence: read_u64(data, Self::OFFSET_WRITE_SEQUENCE),
            page_type: data[Self::OFFSET_PAGE_TYPE],
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// The reserved bytes are zeroed.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        write_u32(data, Self::OFFSET_CHECKSUM, self.checksum);
        write_u32(data, Self::OFFSET_ON_DISK_SIZE, self.on_disk_size);
        write_u32(data, Self::OFFSET_IN_MEMORY_SIZE, self.in_memory_size);
        write_u64(data, Self::OFFSET_WRITE_SEQUENCE, self.write_sequence);
        data[Self::OFFSET_PAGE_TYPE] = self.page_type;
        data[Self::OFFSET_RESERVED..Self::SIZE].fill(0);
    }

    /// Decoded page type.
    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.page_type)
    }

    /// Whether the block body is stored compressed.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.on_disk_size != self.in_memory_size
    }

    /// Whether this header was written after `other`.
    ///
    /// Salvage uses this to pick between two copies of the same logical page.
    #[inline]
    pub fn is_newer_than(&self, other: &PageHeader) -> bool {
        self.write_sequence > other.write_sequence
    }

    /// Compute the CRC32 checksum of a block.
    ///
    /// The checksum field (bytes 0-3) is treated as zero, so the stored value
    /// doesn't feed into itself.
    pub fn compute_checksum(block: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[0u8; 4]);
        hasher.update(&block[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the block contents.
    pub fn verify_checksum(&self, block: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(block)
    }
}

/// Overwrite a single `u32` field of an encoded header in place.
#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

// ============================================================================
// TESTS
// ============================================================================
