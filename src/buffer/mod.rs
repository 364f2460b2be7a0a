//! Buffer lifecycle for the block pipelines.
//!
//! # Components
//! - [`ScratchPool`] / [`ScratchBuffer`] - Pooled temporary page images with
//!   guaranteed release
//! - [`BlockStats`] - I/O and compression statistics

mod scratch;
mod stats;

pub use scratch::{ScratchBuffer, ScratchPool};
pub use stats::{BlockStats, StatsSnapshot};
