//! Page image and block header layout.
//!
//! This module contains:
//! - [`PageImage`] - The owned buffer a page travels in
//! - [`PageHeader`] - The uncompressed 32-byte prefix of every block
//! - [`PageType`] - Discriminator for different page formats

mod page_header;
mod page_image;

pub use page_header::{PageHeader, PageType};
pub use page_image::PageImage;

