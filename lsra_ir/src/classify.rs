//! Node classifier: pure queries about a node's register shape.
//!
//! These answer what lowering and liveness already decided. Nothing
//! here mutates the method.

use crate::method::Method;
use crate::node::Op;
use crate::types::VarType;
use crate::value::{LclNum, NodeRef};

impl Method {
    /// Computed as part of its consumer; owns no register.
    pub fn is_contained(&self, n: NodeRef) -> bool {
        self.node(n).flags.contained
    }

    /// Produces a value into one or more registers.
    pub fn is_value(&self, n: NodeRef) -> bool {
        let node = self.node(n);
        node.op.can_produce_value() && node.ty != VarType::Void
    }

    /// Marked as producing a value that nobody consumes.
    pub fn is_unused_value(&self, n: NodeRef) -> bool {
        self.node(n).flags.unused_value
    }

    /// Residency decided by liveness: the local lives in a register.
    pub fn is_reg_candidate(&self, lcl: LclNum) -> bool {
        self.local(lcl).is_reg_candidate
    }

    /// A promoted local whose fields are each enregistered.
    pub fn is_candidate_multi_reg_local(&self, lcl: LclNum) -> bool {
        let local = self.local(lcl);
        local.is_reg_candidate && !local.fields.is_empty()
    }

    /// The node's result occupies more than one register.
    pub fn is_multi_reg_node(&self, n: NodeRef) -> bool {
        let node = self.node(n);
        match &node.op {
            Op::Call(call) => call.multi_reg_return.is_some(),
            Op::LclVar(lcl) | Op::StoreLclVar(lcl, _) => {
                node.flags.multi_reg && self.is_candidate_multi_reg_local(*lcl)
            }
            _ => false,
        }
    }

    /// Declared register-count descriptor: how many registers the node
    /// defines.
    pub fn register_dst_count(&self, n: NodeRef) -> u32 {
        if !self.is_multi_reg_node(n) {
            return self.is_value(n) as u32;
        }
        match &self.node(n).op {
            Op::Call(call) => call
                .multi_reg_return
                .as_ref()
                .map_or(0, |desc| desc.reg_count()),
            Op::LclVar(lcl) | Op::StoreLclVar(lcl, _) => self.local(*lcl).fields.len() as u32,
            _ => 0,
        }
    }

    /// A reference store the GC must observe through a write barrier.
    ///
    /// Null stores and stores into the frame need no barrier.
    pub fn needs_write_barrier(&self, n: NodeRef) -> bool {
        let node = self.node(n);
        let Op::StoreInd { addr, data } = &node.op else {
            return false;
        };
        if node.ty != VarType::Ref {
            return false;
        }
        if matches!(self.node(*data).op, Op::CnsInt(0)) {
            return false;
        }
        !self.is_stack_address(*addr)
    }

    /// Address known to point into the current frame.
    pub fn is_stack_address(&self, addr: NodeRef) -> bool {
        match &self.node(addr).op {
            Op::LclAddr(..) => true,
            Op::Lea(am) if self.is_contained(addr) => {
                am.index.is_none() && am.base.is_some_and(|b| self.is_stack_address(b))
            }
            _ => false,
        }
    }

    /// Address operand of an indirection-like node.
    pub fn indir_addr(&self, n: NodeRef) -> Option<NodeRef> {
        match &self.node(n).op {
            Op::Ind(addr) | Op::NullCheck(addr) | Op::Blk(addr) => Some(*addr),
            Op::StoreInd { addr, .. } => Some(*addr),
            _ => None,
        }
    }
}
