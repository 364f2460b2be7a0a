//! PageImage - the owned byte buffer every block passes through.
//!
//! A [`PageImage`] holds one page's bytes together with two sizes: the
//! populated length and the allocated capacity. The capacity is kept at or
//! above the next allocation boundary so the write pipeline can zero-pad in
//! place without reallocating.

use crate::common::config::{align_to, HEADER_SIZE};
use crate::common::{Error, Result};

use super::page_header::{self, PageHeader, PageType};

/// An in-memory page image.
///
/// The first [`PageHeader::SIZE`] bytes are always the header; accessors
/// read and write it in place rather than handing out a second mutable view.
///
/// # Clone Implementation
/// `PageImage` does NOT implement `Clone`: copying a page is expensive and
/// should be explicit (`as_slice().to_vec()`).
///
/// # Example
/// ```
/// use treeblock::{PageImage, PageType};
///
/// let image = PageImage::new(PageType::BTreeLeaf, b"hello", 512);
/// assert_eq!(image.len(), 32 + 5);
/// assert_eq!(image.capacity(), 512);
/// assert_eq!(image.payload(), b"hello");
/// ```
pub struct PageImage {
    /// Backing storage; `data.len()` is the capacity and every byte is
    /// initialized.
    data: Vec<u8>,
    /// Number of populated bytes.
    len: usize,
}

impl PageImage {
    /// Create an empty zeroed image with room for `capacity` bytes.
    ///
    /// The capacity never drops below the header size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(HEADER_SIZE)],
            len: 0,
        }
    }

    /// Build an image holding a fresh header of `page_type` followed by
    /// `payload`, with capacity rounded up to `allocation_unit`.
    pub fn new(page_type: PageType, payload: &[u8], allocation_unit: u32) -> Self {
        let len = HEADER_SIZE + payload.len();
        let capacity = align_to(len as u32, allocation_unit) as usize;

        let mut image = Self::with_capacity(capacity);
        image.len = len;
        image.set_header(&PageHeader::new(page_type));
        image.data[HEADER_SIZE..len].copy_from_slice(payload);
        image
    }

    /// Populated length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// The populated bytes past the header.
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_SIZE.min(self.len)..self.len]
    }

    /// Set the populated length.
    ///
    /// Bytes between the old and new length keep whatever the buffer held.
    ///
    /// # Errors
    /// Returns `Error::BufferTooSmall` if `len` exceeds the capacity.
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        self.ensure_capacity(len)?;
        self.len = len;
        Ok(())
    }

    /// Grow the capacity to at least `capacity` bytes, zero-filling.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.data.len() {
            self.data.resize(capacity, 0);
        }
    }

    /// Zero bytes `[len, size)` and extend the length to `size`.
    ///
    /// # Errors
    /// Returns `Error::BufferTooSmall` if `size` exceeds the capacity; the
    /// caller must have sized the buffer for the aligned block.
    pub fn zero_pad_to(&mut self, size: usize) -> Result<()> {
        self.ensure_capacity(size)?;
        if size > self.len {
            self.data[self.len..size].fill(0);
        }
        self.len = size;
        Ok(())
    }

    fn ensure_capacity(&self, needed: usize) -> Result<()> {
        if needed > self.data.len() {
            return Err(Error::BufferTooSmall {
                needed,
                available: self.data.len(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Header access
    // ========================================================================

    /// Decode the header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Encode `header` into the first 32 bytes.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Set both size fields of the header.
    pub fn set_sizes(&mut self, on_disk_size: u32, in_memory_size: u32) {
        page_header::write_u32(&mut self.data, PageHeader::OFFSET_ON_DISK_SIZE, on_disk_size);
        page_header::write_u32(
            &mut self.data,
            PageHeader::OFFSET_IN_MEMORY_SIZE,
            in_memory_size,
        );
    }

    pub fn set_write_sequence(&mut self, sequence: u64) {
        page_header::write_u64(&mut self.data, PageHeader::OFFSET_WRITE_SEQUENCE, sequence);
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Compute and store the checksum over the populated bytes.
    ///
    /// Call this after all other modifications are complete.
    pub fn update_checksum(&mut self) -> u32 {
        page_header::write_u32(&mut self.data, PageHeader::OFFSET_CHECKSUM, 0);
        let checksum = PageHeader::compute_checksum(self.as_slice());
        page_header::write_u32(&mut self.data, PageHeader::OFFSET_CHECKSUM, checksum);
        checksum
    }

    /// Verify the stored checksum against the populated bytes.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(self.as_slice())
    }

    // ========================================================================
    // Storage hand-off (scratch pool)
    // ========================================================================

    /// Wrap pooled storage as an image of `len` populated bytes, growing the
    /// storage if it is too small.
    pub(crate) fn from_storage(data: Vec<u8>, len: usize) -> Self {
        let mut image = Self { data, len: 0 };
        image.reserve(len.max(HEADER_SIZE));
        image.len = len;
        image
    }

    /// An image with no storage, left behind when a guard gives its storage
    /// back to the pool.
    pub(crate) fn detached() -> Self {
        Self {
            data: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn into_storage(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .field("header", &self.header())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
