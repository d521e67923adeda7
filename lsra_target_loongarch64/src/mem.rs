//! Memory operators: indirections, address computation, block stores and
//! stack allocation.

use log::trace;
use lsra_ir::node::{BlkInfo, BlkOpKind, Helper, Op};
use lsra_ir::types::VarType;
use lsra_ir::value::NodeRef;
use lsra_regalloc::{RegClass, RegMask};
use lsra_target::build::BuildCtx;
use lsra_target::descriptor::{AbiRole, TargetDescriptor};
use lsra_target::error::BuildResult;

use crate::abi::LoongArch64;

/// Largest stack allocation zeroed with straight-line stores: four pairs
/// of register stores.
pub const LCLHEAP_UNROLL_LIMIT: u64 = 8 * 2 * 4;

/// Rounds `value` up to a multiple of `align`, a power of two.
fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

impl LoongArch64 {
    /// An address `[base + index + offset]` cannot be encoded in one
    /// instruction when it has both an index and an offset, or when the
    /// offset does not fit the load/store immediate.
    fn needs_addr_temp(&self, index: Option<NodeRef>, offset: i32) -> bool {
        (index.is_some() && offset != 0) || !self.is_valid_imm_offset(offset as i64)
    }

    /// Loads, stores and null checks through an address. A store also
    /// reads its value unless the value is contained.
    pub(crate) fn build_indir(&self, ctx: &mut BuildCtx<'_>, node: NodeRef) -> BuildResult<u32> {
        let method = ctx.method();
        let n = method.node(node);
        if n.ty == VarType::Struct {
            return Err(ctx.violation(node, "struct indirection must be contained"));
        }
        let Some(addr) = method.indir_addr(node) else {
            return Err(ctx.violation(node, "not an indirection"));
        };

        if method.is_contained(addr)
            && let Op::Lea(am) = method.node(addr).op
            && self.needs_addr_temp(am.index, am.offset)
        {
            ctx.internal_int(RegMask::EMPTY);
        }
        if n.ty == VarType::Simd12 {
            // Read and written as an 8-byte and a 4-byte access.
            if method.is_contained(addr) {
                return Err(ctx.violation(node, "12-byte vector address must be in a register"));
            }
            ctx.internal_int(RegMask::EMPTY);
        }

        let mut src = ctx.build_addr_uses(node, addr, RegMask::EMPTY)?;
        if let Op::StoreInd { data, .. } = n.op
            && !method.is_contained(data)
        {
            src += ctx.build_use(node, data, RegMask::EMPTY)?;
        }
        ctx.flush_internal(node);
        if matches!(n.op, Op::Ind(_)) {
            ctx.build_def(node, RegMask::EMPTY);
        }
        Ok(src)
    }

    /// An address computed into a register.
    pub(crate) fn build_lea(&self, ctx: &mut BuildCtx<'_>, node: NodeRef) -> BuildResult<u32> {
        let Op::Lea(am) = ctx.method().node(node).op else {
            return Err(ctx.violation(node, "not an address mode"));
        };
        let mut src = 0;
        if let Some(base) = am.base {
            src += ctx.build_use(node, base, RegMask::EMPTY)?;
        }
        if let Some(index) = am.index {
            src += ctx.build_use(node, index, RegMask::EMPTY)?;
        }
        if self.needs_addr_temp(am.index, am.offset) {
            ctx.internal_int(RegMask::EMPTY);
        }
        ctx.flush_internal(node);
        ctx.build_def(node, RegMask::EMPTY);
        Ok(src)
    }

    /// Block init and block copy, by the strategy lowering picked.
    pub(crate) fn build_block_store(
        &self,
        ctx: &mut BuildCtx<'_>,
        node: NodeRef,
        blk: &BlkInfo,
    ) -> BuildResult<u32> {
        let method = ctx.method();
        let dst_addr = blk.addr;
        let mut dst_mask = RegMask::EMPTY;
        let mut src_mask = RegMask::EMPTY;

        // Initialized from a fill value, or copied from a source address.
        // A struct local source has neither.
        let src_addr_or_fill = if blk.init {
            let fill = match method.node(blk.data).op {
                Op::InitVal(value) => {
                    if !method.is_contained(blk.data) {
                        return Err(ctx.violation(node, "init value must be contained"));
                    }
                    value
                }
                _ => blk.data,
            };
            match blk.kind {
                BlkOpKind::Unroll => {
                    if method.is_contained(dst_addr) {
                        ctx.internal_int(RegMask::EMPTY);
                    }
                    if matches!(method.node(dst_addr).op, Op::LclAddr(..))
                        && blk.size > self.fp_reg_size()
                    {
                        ctx.internal_int(RegMask::EMPTY);
                    }
                }
                BlkOpKind::Loop => {
                    // Loop offset register.
                    ctx.internal_int(self.allocatable(RegClass::Int));
                }
                BlkOpKind::CpObjUnroll => {
                    return Err(ctx.violation(node, "reference copy strategy on a block init"));
                }
            }
            Some(fill)
        } else {
            let src_addr = match method.node(blk.data).op {
                Op::Ind(addr) => {
                    if !method.is_contained(blk.data) {
                        return Err(ctx.violation(node, "block copy source must be contained"));
                    }
                    Some(addr)
                }
                _ => None,
            };
            match blk.kind {
                BlkOpKind::CpObjUnroll => {
                    let roles = self.roles();
                    let byref_regs = roles.mask(AbiRole::WriteBarrierDstByref)
                        | roles.mask(AbiRole::WriteBarrierSrcByref);
                    let temps = self.allocatable(RegClass::Int).without(byref_regs);
                    ctx.internal_int(temps);
                    if blk.size >= 2 * self.reg_size() {
                        ctx.internal_int(temps);
                    }
                    dst_mask = roles.mask(AbiRole::WriteBarrierDstByref);
                    if let Some(addr) = src_addr {
                        if method.is_contained(addr) {
                            return Err(ctx.violation(node, "reference copy source address must be in a register"));
                        }
                        src_mask = roles.mask(AbiRole::WriteBarrierSrcByref);
                    }
                }
                BlkOpKind::Unroll => ctx.internal_int(RegMask::EMPTY),
                BlkOpKind::Loop => {
                    return Err(ctx.violation(node, "loop strategy on a block copy"));
                }
            }
            src_addr
        };

        let mut src = self.build_blk_addr_uses(ctx, node, dst_addr, dst_mask)?;
        if let Some(operand) = src_addr_or_fill {
            src += self.build_blk_addr_uses(ctx, node, operand, src_mask)?;
        }
        ctx.flush_internal(node);
        if blk.kind == BlkOpKind::CpObjUnroll && blk.has_gc_ptrs {
            ctx.build_kills(node, self.helper_kill_set(Helper::AssignByref));
        }
        Ok(src)
    }

    /// A block store operand in a register, or the base of its contained
    /// address mode. Other contained operands need no register.
    fn build_blk_addr_uses(
        &self,
        ctx: &mut BuildCtx<'_>,
        node: NodeRef,
        operand: NodeRef,
        candidates: RegMask,
    ) -> BuildResult<u32> {
        let method = ctx.method();
        if !method.is_contained(operand) {
            return ctx.build_use(node, operand, candidates);
        }
        match method.node(operand).op {
            Op::Lea(am) => match am.base {
                Some(base) => ctx.build_addr_uses(node, base, RegMask::EMPTY),
                None => Ok(0),
            },
            _ => Ok(0),
        }
    }

    /// Dynamic stack allocation.
    ///
    /// | size                              | init memory | temps |
    /// |-----------------------------------|-------------|-------|
    /// | 0                                 | -           | 0     |
    /// | const, aligned <= unroll limit    | -           | 0     |
    /// | const, aligned < page size        | no          | 0     |
    /// | const, above unroll limit         | yes         | 0     |
    /// | const, aligned >= page size       | no          | 2     |
    /// | non-const                         | yes         | 0     |
    /// | non-const                         | no          | 2     |
    pub(crate) fn build_lclheap(
        &self,
        ctx: &mut BuildCtx<'_>,
        node: NodeRef,
        size: NodeRef,
    ) -> BuildResult<u32> {
        let method = ctx.method();
        let init_mem = method.info.init_mem;
        let mut src = 0;

        if let Op::CnsInt(value) = method.node(size).op {
            if !method.is_contained(size) {
                return Err(ctx.violation(node, "constant allocation size must be contained"));
            }
            let Ok(value) = u64::try_from(value) else {
                return Err(ctx.violation(node, format!("negative allocation size {value}")));
            };
            if value != 0 {
                let aligned = align_up(value, self.stack_align() as u64);
                trace!("  {node}: lclheap of {aligned} bytes");
                // Probing page by page needs a counter and a scratch
                // register.
                if aligned > LCLHEAP_UNROLL_LIMIT && !init_mem && aligned >= self.page_size() as u64 {
                    ctx.internal_int(RegMask::EMPTY);
                    ctx.internal_int(RegMask::EMPTY);
                }
            }
        } else {
            if !init_mem {
                ctx.internal_int(RegMask::EMPTY);
                ctx.internal_int(RegMask::EMPTY);
            }
            src += ctx.build_use(node, size, RegMask::EMPTY)?;
        }

        ctx.flush_internal(node);
        ctx.build_def(node, RegMask::EMPTY);
        Ok(src)
    }
}
