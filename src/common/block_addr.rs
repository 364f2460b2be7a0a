//! Block address type.

use std::fmt;

/// Identifies a block on disk, in allocation units.
///
/// Block `N` starts at file offset `N × allocation_unit`. With a `u32`
/// address and a 4KB allocation unit a file can reach 16TB.
///
/// # Example
/// ```
/// use treeblock::BlockAddr;
///
/// let addr = BlockAddr::new(3);
/// assert!(addr.is_valid());
/// assert_eq!(addr.to_offset(512), 1536);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddr(pub u32);

impl BlockAddr {
    /// Sentinel for "no address assigned yet".
    ///
    /// Used when verifying a page image before it has been allocated.
    pub const INVALID: BlockAddr = BlockAddr(u32::MAX);

    #[inline]
    pub fn new(addr: u32) -> Self {
        BlockAddr(addr)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this block in the file.
    #[inline]
    pub fn to_offset(self, allocation_unit: u32) -> u64 {
        self.0 as u64 * allocation_unit as u64
    }
}

impl fmt::Display for BlockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Block(INVALID)")
        } else {
            write!(f, "Block({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_addr_invalid() {
        assert!(!BlockAddr::INVALID.is_valid());
        assert_eq!(BlockAddr::INVALID.0, u32::MAX);
        assert!(BlockAddr::new(0).is_valid());
    }

    #[test]
    fn test_to_offset_does_not_overflow() {
        let addr = BlockAddr::new(u32::MAX - 1);
        assert_eq!(addr.to_offset(4096), (u32::MAX as u64 - 1) * 4096);
    }

    #[test]
    fn test_block_addr_display() {
        assert_eq!(format!("{}", BlockAddr::new(42)), "Block(42)");
        assert_eq!(format!("{}", BlockAddr::INVALID), "Block(INVALID)");
    }
}
