//! Block read/write pipelines.
//!
//! - [`BlockIo`] - Owns a tree's collaborators and runs both pipelines
//! - [`WrittenBlock`] - Address, size and sequence of a written block
//! - [`PageVerifier`] / [`HeaderVerifier`] - Structural gate before write

mod block_io;
mod read;
mod verify;
mod write;

pub use block_io::{BlockIo, WrittenBlock};
pub use verify::{HeaderVerifier, PageVerifier};
