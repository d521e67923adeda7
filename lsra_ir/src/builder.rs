//! Builder API for constructing lowered IR.
//!
//! Nodes are appended to the current block in evaluation order. Blocks
//! must be filled one after another: a block's nodes are a contiguous
//! range of the arena.

use crate::method::{BasicBlock, LocalVar, Method, MethodInfo};
use crate::node::{
    AddrMode, BinOp, BlkInfo, BlkOpKind, CallInfo, CmpOp, Node, NodeFlags, Op, UnOp,
};
use crate::types::VarType;
use crate::value::{BlockRef, LclNum, NodeRef};

/// Builder for constructing a method's IR.
pub struct Builder<'a> {
    method: &'a mut Method,
    current_block: Option<BlockRef>,
}

impl<'a> Builder<'a> {
    pub fn new(method: &'a mut Method) -> Self {
        Self {
            method,
            current_block: None,
        }
    }

    pub fn set_info(&mut self, info: MethodInfo) {
        self.method.info = info;
    }

    /// Create a new basic block and return its reference.
    pub fn create_block(&mut self) -> BlockRef {
        let idx = self.method.blocks.len() as u32;
        self.method.blocks.push(BasicBlock {
            node_start: self.method.nodes.len() as u32,
            node_count: 0,
        });
        BlockRef(idx)
    }

    /// Set the current block for subsequent nodes.
    pub fn switch_to_block(&mut self, block: BlockRef) {
        self.current_block = Some(block);
    }

    /// Declare a local variable.
    pub fn local(&mut self, ty: VarType, is_reg_candidate: bool) -> LclNum {
        let lcl = LclNum(self.method.locals.len() as u32);
        self.method.locals.push(LocalVar {
            ty,
            is_reg_candidate,
            fields: Vec::new(),
        });
        lcl
    }

    /// Declare a promoted struct local whose fields are register
    /// candidates of their own.
    pub fn promoted_local(&mut self, field_tys: &[VarType]) -> LclNum {
        let fields: Vec<LclNum> = field_tys.iter().map(|&ty| self.local(ty, true)).collect();
        let lcl = LclNum(self.method.locals.len() as u32);
        self.method.locals.push(LocalVar {
            ty: VarType::Struct,
            is_reg_candidate: true,
            fields,
        });
        lcl
    }

    /// Append a node to the current block.
    pub fn push(&mut self, op: Op, ty: VarType) -> NodeRef {
        let idx = self.method.nodes.len() as u32;
        self.method.nodes.push(Node {
            op,
            ty,
            flags: NodeFlags::default(),
        });
        if let Some(bb) = self.current_block {
            self.method.blocks[bb.0 as usize].node_count += 1;
        }
        NodeRef(idx)
    }

    fn flags(&mut self, node: NodeRef) -> &mut NodeFlags {
        &mut self.method.nodes[node.0 as usize].flags
    }

    /// Mark a node as computed by its consumer.
    pub fn contain(&mut self, node: NodeRef) -> NodeRef {
        self.flags(node).contained = true;
        node
    }

    /// Mark a value-producing node whose result nobody reads.
    pub fn mark_unused(&mut self, node: NodeRef) -> NodeRef {
        self.flags(node).unused_value = true;
        node
    }

    pub fn set_overflow(&mut self, node: NodeRef) -> NodeRef {
        self.flags(node).overflow = true;
        node
    }

    pub fn set_multi_reg(&mut self, node: NodeRef) -> NodeRef {
        self.flags(node).multi_reg = true;
        node
    }

    // -- Convenience constructors --

    pub fn iconst(&mut self, val: i64, ty: VarType) -> NodeRef {
        self.push(Op::CnsInt(val), ty)
    }

    pub fn dconst(&mut self, val: f64, ty: VarType) -> NodeRef {
        self.push(Op::CnsDbl(val), ty)
    }

    pub fn lcl_var(&mut self, lcl: LclNum) -> NodeRef {
        let ty = self.method.locals[lcl.0 as usize].ty;
        self.push(Op::LclVar(lcl), ty)
    }

    pub fn lcl_fld(&mut self, lcl: LclNum, offset: u16, ty: VarType) -> NodeRef {
        self.push(Op::LclFld(lcl, offset), ty)
    }

    pub fn lcl_addr(&mut self, lcl: LclNum, offset: u16) -> NodeRef {
        self.push(Op::LclAddr(lcl, offset), VarType::Byref)
    }

    pub fn store_lcl_var(&mut self, lcl: LclNum, value: NodeRef) -> NodeRef {
        let ty = self.method.locals[lcl.0 as usize].ty;
        self.push(Op::StoreLclVar(lcl, value), ty)
    }

    pub fn store_lcl_fld(&mut self, lcl: LclNum, offset: u16, value: NodeRef) -> NodeRef {
        let ty = self.method.nodes[value.0 as usize].ty;
        self.push(Op::StoreLclFld(lcl, offset, value), ty)
    }

    pub fn binary(&mut self, op: BinOp, a: NodeRef, b: NodeRef, ty: VarType) -> NodeRef {
        self.push(Op::Binary(op, a, b), ty)
    }

    pub fn unary(&mut self, op: UnOp, a: NodeRef, ty: VarType) -> NodeRef {
        self.push(Op::Unary(op, a), ty)
    }

    /// Value-producing comparison.
    pub fn cmp(&mut self, op: CmpOp, a: NodeRef, b: NodeRef) -> NodeRef {
        self.push(Op::Cmp(op, a, b), VarType::Int)
    }

    /// Fused compare-and-branch.
    pub fn jcmp(&mut self, op: CmpOp, a: NodeRef, b: NodeRef) -> NodeRef {
        self.push(Op::JCmp(op, a, b), VarType::Void)
    }

    pub fn cast(&mut self, a: NodeRef, ty: VarType) -> NodeRef {
        self.push(Op::Cast(a), ty)
    }

    /// Address mode node; contain it to fold it into its consumer.
    pub fn lea(
        &mut self,
        base: Option<NodeRef>,
        index: Option<NodeRef>,
        scale: u8,
        offset: i32,
    ) -> NodeRef {
        self.push(
            Op::Lea(AddrMode {
                base,
                index,
                scale,
                offset,
            }),
            VarType::Byref,
        )
    }

    pub fn ind(&mut self, addr: NodeRef, ty: VarType) -> NodeRef {
        self.push(Op::Ind(addr), ty)
    }

    pub fn store_ind(&mut self, addr: NodeRef, data: NodeRef, ty: VarType) -> NodeRef {
        self.push(Op::StoreInd { addr, data }, ty)
    }

    pub fn null_check(&mut self, addr: NodeRef) -> NodeRef {
        self.push(Op::NullCheck(addr), VarType::Void)
    }

    pub fn bounds_check(&mut self, index: NodeRef, length: NodeRef) -> NodeRef {
        self.push(Op::BoundsCheck { index, length }, VarType::Void)
    }

    pub fn putarg_reg(&mut self, value: NodeRef, slot: u8) -> NodeRef {
        let ty = self.method.nodes[value.0 as usize].ty;
        self.push(Op::PutArgReg(value, slot), ty)
    }

    pub fn putarg_stk(&mut self, value: NodeRef) -> NodeRef {
        self.push(Op::PutArgStk(value), VarType::Void)
    }

    pub fn field_list(&mut self, fields: Vec<NodeRef>) -> NodeRef {
        let node = self.push(Op::FieldList(fields), VarType::Struct);
        self.contain(node)
    }

    pub fn call(&mut self, info: CallInfo, ret_ty: VarType) -> NodeRef {
        let multi_reg = info.multi_reg_return.is_some();
        let node = self.push(Op::Call(Box::new(info)), ret_ty);
        if multi_reg {
            self.set_multi_reg(node);
        }
        node
    }

    pub fn store_blk(
        &mut self,
        addr: NodeRef,
        data: NodeRef,
        size: u32,
        kind: BlkOpKind,
        init: bool,
        has_gc_ptrs: bool,
    ) -> NodeRef {
        self.push(
            Op::StoreBlk(Box::new(BlkInfo {
                addr,
                data,
                size,
                kind,
                init,
                has_gc_ptrs,
            })),
            VarType::Struct,
        )
    }

    pub fn lclheap(&mut self, size: NodeRef) -> NodeRef {
        self.push(Op::LclHeap(size), VarType::Long)
    }

    /// Return from the method.
    pub fn ret(&mut self, value: Option<NodeRef>) -> NodeRef {
        let ty = match value {
            Some(v) => self.method.nodes[v.0 as usize].ty,
            None => VarType::Void,
        };
        self.push(Op::Return(value), ty)
    }
}
