//! Calls and outgoing arguments.

use log::trace;
use lsra_ir::node::{CallInfo, CallTarget, Op};
use lsra_ir::types::VarType;
use lsra_ir::value::NodeRef;
use lsra_regalloc::{RegClass, RegMask};
use lsra_target::build::BuildCtx;
use lsra_target::descriptor::{AbiRole, TargetDescriptor};
use lsra_target::error::BuildResult;

use crate::abi::LoongArch64;

impl LoongArch64 {
    /// Registers a fast tail call may hold its target in: the epilog
    /// restores every callee-saved register before the jump, and the GS
    /// cookie check runs in its two temporaries.
    fn tail_call_target_regs(&self, ctx: &BuildCtx<'_>) -> RegMask {
        let mut regs = self.allocatable(RegClass::Int) & self.callee_trash(RegClass::Int);
        if ctx.method().info.needs_gs_cookie {
            let roles = self.roles();
            regs = regs.without(roles.mask(AbiRole::GsCookieTmp0) | roles.mask(AbiRole::GsCookieTmp1));
        }
        regs
    }

    pub(crate) fn build_call(
        &self,
        ctx: &mut BuildCtx<'_>,
        node: NodeRef,
        call: &CallInfo,
    ) -> BuildResult<u32> {
        let method = ctx.method();
        let target_candidates = if call.fast_tail_call {
            self.tail_call_target_regs(ctx)
        } else {
            RegMask::EMPTY
        };

        let ctrl = match call.target {
            CallTarget::Indirect(addr) | CallTarget::Control(addr) => {
                if method.node(addr).ty == VarType::Void {
                    return Err(ctx.violation(node, "call target has no value"));
                }
                Some(addr)
            }
            CallTarget::IndirectCell => {
                // The cell address arrives in the indirection parameter
                // register; the target is loaded through it into a temp.
                ctx.internal_int(target_candidates);
                None
            }
            CallTarget::Direct => None,
        };

        let mut src = ctx.build_call_arg_uses(node, call)?;
        if let Some(addr) = ctrl {
            src += ctx.build_use(node, addr, target_candidates)?;
        }
        ctx.flush_internal(node);

        let kills = self.call_kill_set(call);
        trace!("  {node}: call kills {kills}");
        let ret_ty = method.node(node).ty;
        if let Some(desc) = &call.multi_reg_return {
            let Some(regs) = self.abi_return_regs(desc) else {
                return Err(ctx.violation(node, "return value needs more registers than the ABI has"));
            };
            ctx.build_call_defs_with_kills(node, desc, &regs, kills);
        } else if ret_ty != VarType::Void {
            ctx.build_def_with_kills(node, RegMask::single(self.return_reg(ret_ty)), kills);
        } else {
            ctx.build_kills(node, kills);
        }

        ctx.reset_placed_args();
        Ok(src)
    }

    /// Argument passed on the stack. Struct arguments are copied with
    /// load/store pairs; scalars are stored from their register.
    pub(crate) fn build_putarg_stk(&self, ctx: &mut BuildCtx<'_>, node: NodeRef) -> BuildResult<u32> {
        let method = ctx.method();
        let Op::PutArgStk(child) = method.node(node).op else {
            return Err(ctx.violation(node, "not a stack argument"));
        };
        let child_node = method.node(child);

        let mut src = 0;
        match &child_node.op {
            Op::FieldList(items) => {
                if !method.is_contained(child) {
                    return Err(ctx.violation(node, "field list must be contained"));
                }
                for &item in items {
                    src += ctx.build_use(node, item, RegMask::EMPTY)?;
                }
            }
            _ if child_node.ty == VarType::Struct => {
                ctx.internal_int(RegMask::EMPTY);
                ctx.internal_int(RegMask::EMPTY);
                if let Op::Blk(addr) = child_node.op {
                    if !method.is_contained(child) {
                        return Err(ctx.violation(node, "struct argument source must be contained"));
                    }
                    if matches!(method.node(addr).op, Op::LclAddr(..)) {
                        // Address, load and store are all folded into the
                        // copy sequence.
                        if !method.is_contained(addr) {
                            return Err(ctx.violation(node, "local address of a struct argument must be contained"));
                        }
                    } else {
                        src += ctx.build_operand_uses(node, addr, RegMask::EMPTY)?;
                    }
                }
                // A struct local is copied straight from its frame slot.
            }
            _ => {
                if method.is_contained(child) {
                    return Err(ctx.violation(node, "scalar stack argument must be in a register"));
                }
                src += ctx.build_operand_uses(node, child, RegMask::EMPTY)?;
            }
        }
        ctx.flush_internal(node);
        Ok(src)
    }
}
