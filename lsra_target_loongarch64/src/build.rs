//! LoongArch64 register requirements: per-operator dispatch.
//!
//! `build_node` is called once per non-contained node in evaluation
//! order. Each arm reports how many operand registers the node reads and
//! how many registers it defines; the shared context checks the defined
//! count against the IR before the node's run is closed.

use lsra_ir::node::{BinOp, Helper, MathIntrinsic, Op};
use lsra_ir::types::VarType;
use lsra_ir::value::NodeRef;
use lsra_regalloc::{KillSet, RegClass, RegMask};
use lsra_target::backend::Backend;
use lsra_target::build::{BuildCtx, NodeBuild};
use lsra_target::descriptor::{AbiRole, TargetDescriptor};
use lsra_target::error::BuildResult;

use crate::abi::LoongArch64;

impl Backend for LoongArch64 {
    fn target(&self) -> &dyn TargetDescriptor {
        self
    }

    fn build_node(&self, ctx: &mut BuildCtx<'_>, node: NodeRef) -> BuildResult<NodeBuild> {
        let method = ctx.method();
        let n = method.node(node);
        let mut dst = method.is_value(node) as u32;

        let src = match &n.op {
            // Candidates are read directly by their consumers.
            Op::LclVar(lcl) if method.is_reg_candidate(*lcl) => return Ok(NodeBuild::Deferred),
            Op::LclVar(_) | Op::LclFld(..) => {
                if n.ty == VarType::Simd12 {
                    // The upper 4 bytes are loaded separately while the
                    // destination already holds the lower 8.
                    ctx.internal_int(RegMask::EMPTY);
                    ctx.set_internal_delay_free();
                    ctx.flush_internal(node);
                }
                ctx.build_def(node, RegMask::EMPTY);
                0
            }
            Op::StoreLclVar(lcl, _) => {
                if method.is_multi_reg_node(node) {
                    dst = method.local(*lcl).fields.len() as u32;
                }
                ctx.build_store_loc(node)?
            }
            Op::StoreLclFld(..) => ctx.build_store_loc(node)?,
            Op::FieldList(_) => {
                return Err(ctx.violation(node, "field list must be contained"));
            }

            Op::NoOp | Op::StartNonGc | Op::Nop | Op::JTrue(_) | Op::Jmp => 0,
            Op::ProfHook => {
                if method.info.profiler_hooks {
                    ctx.build_kills(node, self.helper_kill_set(Helper::ProfilerTailcall));
                }
                0
            }
            Op::StartPreemptGc => {
                // Callee-saved registers survive the transition but the GC
                // may move what they point to.
                ctx.build_kills(
                    node,
                    KillSet {
                        regs: RegMask::EMPTY,
                        gc_refs: self.callee_saved(RegClass::Int),
                    },
                );
                0
            }
            Op::MemoryBarrier => 0,

            Op::CnsDbl(_) => {
                // No FP immediate loads: the constant comes from memory
                // through an integer address register.
                ctx.internal_int(RegMask::EMPTY);
                ctx.flush_internal(node);
                ctx.build_def(node, RegMask::EMPTY);
                0
            }
            Op::CnsInt(_) => {
                ctx.build_def(node, RegMask::EMPTY);
                0
            }

            Op::Box(_) | Op::Comma(..) | Op::Qmark(..) | Op::Colon(..) => {
                return Err(ctx.violation(node, "front-end form survived lowering"));
            }
            Op::Switch(_) => return Err(ctx.violation(node, "switch must be lowered")),
            Op::ArrElem(_) => return Err(ctx.violation(node, "array element must be lowered")),
            Op::Blk(_) => {
                return Err(ctx.violation(node, "block load outside a block store"));
            }
            Op::InitVal(_) => return Err(ctx.violation(node, "init value must be contained")),

            Op::Return(_) => {
                let src = ctx.build_return(node)?;
                if method.info.profiler_hooks {
                    ctx.build_kills(node, self.helper_kill_set(Helper::ProfilerLeave));
                }
                src
            }
            Op::RetFilt(value) => match value {
                Some(value) if n.ty != VarType::Void => {
                    if n.ty != VarType::Int {
                        return Err(ctx.violation(node, format!("filter returns {}", n.ty)));
                    }
                    let ret = self.roles().mask(AbiRole::IntReturn);
                    ctx.build_use(node, *value, ret)?
                }
                _ => 0,
            },
            Op::KeepAlive(value) => ctx.build_operand_uses(node, *value, RegMask::EMPTY)?,
            Op::JmpTable => {
                ctx.build_def(node, RegMask::EMPTY);
                0
            }
            Op::SwitchTable(index, table) => {
                ctx.internal_int(RegMask::EMPTY);
                let src = ctx.build_binary_uses(node, *index, *table)?;
                ctx.flush_internal(node);
                src
            }
            Op::ReturnTrap(value) => {
                let src = ctx.build_use(node, *value, RegMask::EMPTY)?;
                ctx.build_kills(node, self.helper_kill_set(Helper::StopForGc));
                src
            }

            Op::Binary(op, a, b) => self.build_binary(ctx, node, *op, *a, *b)?,
            Op::Unary(_, value) => {
                let src = ctx.build_use(node, *value, RegMask::EMPTY)?;
                ctx.build_def(node, RegMask::EMPTY);
                src
            }
            Op::Intrinsic(which, value) => {
                match which {
                    MathIntrinsic::Abs
                    | MathIntrinsic::Ceiling
                    | MathIntrinsic::Floor
                    | MathIntrinsic::Round
                    | MathIntrinsic::Sqrt => {}
                    _ => {
                        return Err(ctx.violation(
                            node,
                            format!("{} must be lowered to a call", which.name()),
                        ));
                    }
                }
                let operand_ty = method.node(*value).ty;
                if !operand_ty.is_floating() || operand_ty != n.ty {
                    return Err(ctx.violation(
                        node,
                        format!("{} of {operand_ty} producing {}", which.name(), n.ty),
                    ));
                }
                let src = ctx.build_use(node, *value, RegMask::EMPTY)?;
                ctx.build_def(node, RegMask::EMPTY);
                src
            }
            Op::HwIntrinsic(_) | Op::CmpXchg { .. } | Op::Atomic(..) => {
                return Err(ctx.not_implemented(node));
            }
            Op::Cast(value) | Op::Bitcast(value) => {
                let src = ctx.build_operand_uses(node, *value, RegMask::EMPTY)?;
                ctx.build_def(node, RegMask::EMPTY);
                src
            }
            Op::Cmp(_, a, b) | Op::JCmp(_, a, b) => ctx.build_cmp(node, *a, *b)?,
            Op::CkFinite(value) => {
                // Exponent bits are tested in an integer register.
                ctx.internal_int(RegMask::EMPTY);
                let src = ctx.build_use(node, *value, RegMask::EMPTY)?;
                ctx.flush_internal(node);
                ctx.build_def(node, RegMask::EMPTY);
                src
            }

            Op::PutArgStk(_) => self.build_putarg_stk(ctx, node)?,
            Op::PutArgReg(..) => ctx.build_putarg_reg(node)?,
            Op::Call(call) => {
                if let Some(desc) = &call.multi_reg_return {
                    dst = desc.reg_count();
                }
                self.build_call(ctx, node, call)?
            }

            Op::StoreBlk(blk) => self.build_block_store(ctx, node, blk)?,
            Op::LclHeap(size) => self.build_lclheap(ctx, node, *size)?,
            Op::BoundsCheck { index, length } => {
                let src = ctx.build_operand_uses(node, *index, RegMask::EMPTY)?;
                src + ctx.build_operand_uses(node, *length, RegMask::EMPTY)?
            }
            Op::Lea(_) => self.build_lea(ctx, node)?,
            Op::StoreInd { .. } if method.needs_write_barrier(node) => {
                ctx.build_gc_write_barrier(node)?
            }
            Op::Ind(_) | Op::NullCheck(_) | Op::StoreInd { .. } => self.build_indir(ctx, node)?,
            Op::IndexAddr(array, index) => {
                let src = ctx.build_binary_uses(node, *array, *index)?;
                ctx.internal_int(RegMask::EMPTY);
                ctx.flush_internal(node);
                ctx.build_def(node, RegMask::EMPTY);
                src
            }

            Op::CatchArg => {
                ctx.build_def(node, self.roles().mask(AbiRole::ExceptionObject));
                0
            }
            Op::AsyncContinuation => {
                ctx.build_def(node, self.roles().mask(AbiRole::AsyncContinuationReturn));
                0
            }

            Op::LclAddr(..) | Op::Select(..) => ctx.build_simple(node)?,
        };

        Ok(NodeBuild::Built { src, dst })
    }
}

impl LoongArch64 {
    fn build_binary(
        &self,
        ctx: &mut BuildCtx<'_>,
        node: NodeRef,
        op: BinOp,
        a: NodeRef,
        b: NodeRef,
    ) -> BuildResult<u32> {
        let method = ctx.method();
        let n = method.node(node);
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul if n.ty.is_floating() => {
                if n.flags.overflow {
                    return Err(ctx.violation(node, "overflow check on floating point arithmetic"));
                }
                let (ta, tb) = (method.node(a).ty, method.node(b).ty);
                if ta != tb {
                    return Err(ctx.violation(node, format!("mixed operand types {ta} and {tb}")));
                }
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul if n.flags.overflow => {
                // The overflow check reads the sources after the result is
                // written.
                ctx.internal_int(RegMask::EMPTY);
                ctx.set_internal_delay_free();
            }
            _ if op.is_division() || op == BinOp::MulHi => {
                if method.is_contained(a) || method.is_contained(b) {
                    return Err(ctx.violation(node, "division operands must be in registers"));
                }
            }
            _ => {}
        }
        let src = ctx.build_binary_uses(node, a, b)?;
        ctx.flush_internal(node);
        ctx.build_def(node, RegMask::EMPTY);
        Ok(src)
    }
}
