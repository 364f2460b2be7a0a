//! Common types shared across the block layer.
//!
//! - Configuration constants and [`BlockConfig`](config::BlockConfig)
//! - Error types
//! - [`BlockAddr`]

mod block_addr;
pub mod config;
pub mod error;

pub use block_addr::BlockAddr;
pub use error::{Error, Result};
