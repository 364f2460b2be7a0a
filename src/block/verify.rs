//! Structural verification gate run before every write.

use crate::common::config::HEADER_SIZE;
use crate::common::{BlockAddr, Error, Result};
use crate::storage::page::{PageHeader, PageType};

/// Structural check of a page image.
///
/// The write pipeline calls this with [`BlockAddr::INVALID`] before any
/// space is claimed. Any error is a bug in whoever built the page and the
/// block is never written.
pub trait PageVerifier: Send + Sync {
    fn verify(&self, image: &[u8], addr: BlockAddr, size: u32) -> Result<()>;
}

/// Default verifier: checks only what the block layer itself relies on.
///
/// - the image holds at least a full header
/// - both header sizes match `size` (the image is not yet compressed)
/// - the page type is set
/// - the reserved header bytes are zero
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderVerifier;

impl PageVerifier for HeaderVerifier {
    fn verify(&self, image: &[u8], addr: BlockAddr, size: u32) -> Result<()> {
        let fail = |reason: String| {
            Err(Error::StructuralVerification { addr, size, reason })
        };

        if image.len() < HEADER_SIZE {
            return fail(format!(
                "image is {} bytes, shorter than the {}-byte header",
                image.len(),
                HEADER_SIZE
            ));
        }
        if image.len() != size as usize {
            return fail(format!("image is {} bytes, expected {}", image.len(), size));
        }

        let header = PageHeader::from_bytes(image);
        if header.on_disk_size != size || header.in_memory_size != size {
            return fail(format!(
                "header sizes {}/{} do not match image size {}",
                header.on_disk_size, header.in_memory_size, size
            ));
        }
        if header.page_type() == PageType::Invalid {
            return fail("page type is not set".to_string());
        }
        if image[PageHeader::OFFSET_RESERVED..HEADER_SIZE]
            .iter()
            .any(|&b| b != 0)
        {
            return fail("reserved header bytes are not zero".to_string());
        }

        Ok(())
    }
}
