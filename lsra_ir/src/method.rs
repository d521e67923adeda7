//! Method container: node arena, basic blocks and the local table.
//!
//! Blocks are contiguous ranges of the node arena. Within a block, arena
//! order is evaluation order, so walking the blocks in order and their
//! nodes in order visits the method in the order the register
//! requirements are built.

use crate::node::Node;
use crate::types::VarType;
use crate::value::{BlockRef, LclNum, NodeRef};

/// A basic block: a range of the method's node arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub node_start: u32,
    pub node_count: u32,
}

/// A local variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
    pub ty: VarType,
    /// Upstream liveness decided this local lives in a register; its
    /// loads and stores are modelled on the local's own interval.
    pub is_reg_candidate: bool,
    /// Promoted field locals, one per register of a multi-register local.
    pub fields: Vec<LclNum>,
}

/// Per-method compiler facts consulted while building requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodInfo {
    /// Dynamically allocated stack space must be zero-initialized.
    pub init_mem: bool,
    /// The method carries a GS security cookie checked in the epilog.
    pub needs_gs_cookie: bool,
    pub is_async: bool,
    /// Profiler enter/leave/tailcall hooks are emitted.
    pub profiler_hooks: bool,
}

/// A method in lowered IR form.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub info: MethodInfo,
    /// Node arena: contiguous storage, evaluation order within blocks.
    pub nodes: Vec<Node>,
    pub blocks: Vec<BasicBlock>,
    pub locals: Vec<LocalVar>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: MethodInfo::default(),
            nodes: Vec::new(),
            blocks: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Get a node by reference.
    pub fn node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.index() as usize]
    }

    /// Get a node by reference, if it exists.
    pub fn get(&self, r: NodeRef) -> Option<&Node> {
        self.nodes.get(r.index() as usize)
    }

    /// Get a basic block by reference.
    pub fn block(&self, r: BlockRef) -> &BasicBlock {
        &self.blocks[r.index() as usize]
    }

    /// Get a local by number.
    pub fn local(&self, lcl: LclNum) -> &LocalVar {
        &self.locals[lcl.index() as usize]
    }

    /// All blocks in layout order.
    pub fn block_refs(&self) -> impl Iterator<Item = BlockRef> {
        (0..self.blocks.len() as u32).map(BlockRef)
    }

    /// Nodes of a block in evaluation order.
    pub fn block_nodes(&self, r: BlockRef) -> impl Iterator<Item = NodeRef> {
        let bb = self.block(r);
        (bb.node_start..bb.node_start + bb.node_count).map(NodeRef)
    }

    /// Every node of the method in evaluation order.
    pub fn nodes_in_order(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.block_refs().flat_map(move |b| self.block_nodes(b))
    }
}
