//! Opaque handles for IR entities.
//!
//! All references into the IR are u32 indices, not pointers.
//! Nodes live in a per-method arena; a handle is only meaningful
//! together with the method that produced it.

use std::fmt;

/// Reference to a node in the method's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef(pub(crate) u32);

impl NodeRef {
    /// Raw index into the node arena.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Reference to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef(pub(crate) u32);

impl BlockRef {
    /// Raw index into the block arena.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Local variable number: index into the method's local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LclNum(pub(crate) u32);

impl LclNum {
    /// Raw index into the local table.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LclNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:02}", self.0)
    }
}
