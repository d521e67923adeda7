//! Tests for the target descriptor defaults and the shared build context.

use lsra_ir::builder::Builder;
use lsra_ir::method::Method;
use lsra_ir::node::{BinOp, CallInfo, CallTarget, Helper, Op, ReturnTypeDesc};
use lsra_ir::types::VarType;
use lsra_ir::value::NodeRef;
use lsra_regalloc::stream::{IntervalKind, RefKind};
use lsra_regalloc::{KillSet, PReg, RegClass, RegMask};

use crate::backend::{Backend, build_ref_positions};
use crate::build::{BuildCtx, NodeBuild};
use crate::descriptor::{AbiRole, FixedRoles, TargetDescriptor};
use crate::error::{BuildError, BuildResult};
use crate::options::TargetOptions;

/// Small target: r1..r7 int, f0..f3 float, r1/r2 and f0/f1 trashed.
struct Toy {
    options: TargetOptions,
    roles: FixedRoles,
}

impl Toy {
    fn new(options: TargetOptions) -> Self {
        Self {
            options,
            roles: FixedRoles::from_fn(|role| match role {
                AbiRole::IntReturn | AbiRole::LongReturn | AbiRole::ExceptionObject => PReg::int(1),
                AbiRole::IntReturnSecondary => PReg::int(2),
                AbiRole::FloatReturn => PReg::float(0),
                AbiRole::FloatReturnSecondary => PReg::float(1),
                AbiRole::WriteBarrierDst | AbiRole::WriteBarrierDstByref => PReg::int(3),
                AbiRole::WriteBarrierSrc | AbiRole::WriteBarrierSrcByref => PReg::int(4),
                AbiRole::AsyncContinuationReturn => PReg::int(5),
                AbiRole::R2rIndirectParam => PReg::int(6),
                AbiRole::GsCookieTmp0 | AbiRole::GsCookieTmp1 => PReg::int(7),
            }),
        }
    }
}

impl TargetDescriptor for Toy {
    fn name(&self) -> &'static str {
        "toy"
    }

    fn options(&self) -> &TargetOptions {
        &self.options
    }

    fn reg_size(&self) -> u32 {
        8
    }

    fn fp_reg_size(&self) -> u32 {
        8
    }

    fn stack_align(&self) -> u32 {
        16
    }

    fn is_valid_imm_offset(&self, offset: i64) -> bool {
        (-128..128).contains(&offset)
    }

    fn allocatable(&self, class: RegClass) -> RegMask {
        match class {
            RegClass::Int => RegMask::from_regs(&(1..8).map(PReg::int).collect::<Vec<_>>()),
            RegClass::Float => RegMask::from_regs(&(0..4).map(PReg::float).collect::<Vec<_>>()),
        }
    }

    fn callee_trash(&self, class: RegClass) -> RegMask {
        match class {
            RegClass::Int => RegMask::from_regs(&[PReg::int(1), PReg::int(2)]),
            RegClass::Float => RegMask::from_regs(&[PReg::float(0), PReg::float(1)]),
        }
    }

    fn callee_saved(&self, class: RegClass) -> RegMask {
        self.allocatable(class).without(self.callee_trash(class))
    }

    fn roles(&self) -> &FixedRoles {
        &self.roles
    }

    fn arg_reg(&self, class: RegClass, slot: u8) -> Option<PReg> {
        match (class, slot) {
            (RegClass::Int, 0..=1) => Some(PReg::int(1 + slot)),
            (RegClass::Float, 0..=1) => Some(PReg::float(slot)),
            _ => None,
        }
    }

    fn helper_kill_set(&self, helper: Helper) -> KillSet {
        match helper {
            Helper::WriteBarrier | Helper::CheckedWriteBarrier => {
                KillSet::regs(RegMask::from_regs(&[PReg::int(3), PReg::int(4)]))
            }
            _ => KillSet::regs(self.callee_trash(RegClass::Int)),
        }
    }
}

/// Minimal backend exercising the shared policies.
struct ToyBackend(Toy);

impl Backend for ToyBackend {
    fn target(&self) -> &dyn TargetDescriptor {
        &self.0
    }

    fn build_node(&self, ctx: &mut BuildCtx<'_>, node: NodeRef) -> BuildResult<NodeBuild> {
        let method = ctx.method();
        let dst = method.register_dst_count(node);
        let src = match &method.node(node).op {
            Op::LclVar(lcl) if method.is_reg_candidate(*lcl) => return Ok(NodeBuild::Deferred),
            Op::Binary(BinOp::Add, a, b) if method.node(node).flags.overflow => {
                ctx.internal_int(RegMask::EMPTY);
                ctx.set_internal_delay_free();
                let src = ctx.build_binary_uses(node, *a, *b)?;
                ctx.flush_internal(node);
                ctx.build_def(node, RegMask::EMPTY);
                src
            }
            Op::Return(_) => ctx.build_return(node)?,
            Op::StoreLclVar(..) => ctx.build_store_loc(node)?,
            Op::PutArgReg(..) => ctx.build_putarg_reg(node)?,
            Op::StoreInd { .. } if method.needs_write_barrier(node) => {
                ctx.build_gc_write_barrier(node)?
            }
            Op::Call(call) => {
                let src = ctx.build_call_arg_uses(node, call)?;
                let kills = self.0.call_kill_set(call);
                match &call.multi_reg_return {
                    Some(desc) => {
                        let regs = self
                            .0
                            .abi_return_regs(desc)
                            .ok_or_else(|| ctx.violation(node, "too many return registers"))?;
                        ctx.build_call_defs_with_kills(node, desc, &regs, kills);
                    }
                    None if dst == 1 => {
                        let reg = self.0.return_reg(method.node(node).ty);
                        ctx.build_def_with_kills(node, RegMask::single(reg), kills);
                    }
                    None => ctx.build_kills(node, kills),
                }
                ctx.reset_placed_args();
                src
            }
            _ => ctx.build_simple(node)?,
        };
        Ok(NodeBuild::Built { src, dst })
    }
}

fn toy() -> ToyBackend {
    ToyBackend(Toy::new(TargetOptions::default()))
}

fn method_with(body: impl FnOnce(&mut Builder<'_>)) -> Method {
    let mut method = Method::new("test");
    let mut b = Builder::new(&mut method);
    let bb = b.create_block();
    b.switch_to_block(bb);
    body(&mut b);
    method
}

fn node(i: usize, method: &Method) -> NodeRef {
    method.nodes_in_order().nth(i).expect("node index in range")
}

#[test]
fn options_defaults_and_setters() {
    let opts = TargetOptions::default();
    assert_eq!(opts.page_size, 0x1000);
    assert!(opts.gc_interruptible_kills_refs);

    let opts = opts
        .with_page_size(0x4000)
        .with_gc_interruptible_kills_refs(false);
    assert_eq!(opts.page_size, 0x4000);
    assert!(!opts.gc_interruptible_kills_refs);
    assert_eq!(Toy::new(opts).page_size(), 0x4000);
}

#[test]
fn fixed_roles_lookup() {
    let target = Toy::new(TargetOptions::default());
    assert_eq!(target.fixed_reg(AbiRole::IntReturnSecondary), PReg::int(2));
    assert_eq!(target.fixed_reg(AbiRole::R2rIndirectParam), PReg::int(6));
    assert_eq!(
        target.roles().mask(AbiRole::WriteBarrierSrc),
        RegMask::single(PReg::int(4))
    );
}

#[test]
fn return_register_by_value_class() {
    let target = Toy::new(TargetOptions::default());
    assert_eq!(target.return_reg(VarType::Double), PReg::float(0));
    assert_eq!(target.return_reg(VarType::Simd16), PReg::float(0));
    assert_eq!(target.return_reg(VarType::Long), PReg::int(1));
    assert_eq!(target.return_reg(VarType::Ref), PReg::int(1));
}

#[test]
fn multi_reg_return_assigns_per_class() {
    let target = Toy::new(TargetOptions::default());
    let mixed = ReturnTypeDesc::new(&[VarType::Long, VarType::Double]);
    assert_eq!(
        target.abi_return_regs(&mixed).as_deref(),
        Some(&[PReg::int(1), PReg::float(0)][..])
    );
    let floats = ReturnTypeDesc::new(&[VarType::Float, VarType::Float]);
    assert_eq!(
        target.abi_return_regs(&floats).as_deref(),
        Some(&[PReg::float(0), PReg::float(1)][..])
    );
    let too_many = ReturnTypeDesc::new(&[VarType::Long, VarType::Long, VarType::Long]);
    assert_eq!(target.abi_return_regs(&too_many), None);
}

#[test]
fn call_kill_set_adds_gc_refs_for_interruptible_calls() {
    let target = Toy::new(TargetOptions::default());
    let call = CallInfo::user(CallTarget::Direct, vec![]);
    let kills = target.call_kill_set(&call);
    assert_eq!(
        kills.regs,
        target.callee_trash(RegClass::Int) | target.callee_trash(RegClass::Float)
    );
    assert_eq!(kills.gc_refs, target.allocatable(RegClass::Int));

    let barrier = CallInfo::helper(Helper::WriteBarrier, vec![]);
    assert!(target.call_kill_set(&barrier).gc_refs.is_empty());

    let quiet = Toy::new(TargetOptions::default().with_gc_interruptible_kills_refs(false));
    assert!(quiet.call_kill_set(&call).gc_refs.is_empty());
}

#[test]
fn error_kinds() {
    let method = method_with(|b| {
        b.iconst(1, VarType::Int);
    });
    let target = Toy::new(TargetOptions::default());
    let ctx = BuildCtx::new(&method, &target);
    let n0 = node(0, &method);

    let gap = ctx.not_implemented(n0);
    assert!(gap.is_capability_gap());
    assert_eq!(gap.to_string(), "cns_int at n0 is not implemented for toy");

    let defect = ctx.violation(n0, "bad");
    assert!(!defect.is_capability_gap());
    assert_eq!(defect.to_string(), "invariant violation at n0 (cns_int): bad");
    assert!(!BuildError::Verify("x".into()).is_capability_gap());
}

#[test]
fn simple_nodes_use_then_def() {
    let method = method_with(|b| {
        let x = b.local(VarType::Long, true);
        let a = b.lcl_var(x);
        let c = b.iconst(3, VarType::Long);
        let sum = b.binary(BinOp::Sub, a, c, VarType::Long);
        b.ret(Some(sum));
    });
    let stream = build_ref_positions(&toy(), &method).expect("build");

    // The candidate local is deferred to its consumer.
    assert!(stream.run_of(node(0, &method)).is_none());
    let konst = stream.def_interval(node(1, &method)).expect("const def");
    assert!(stream.interval(konst).is_constant());

    let sub = stream.node_positions(node(2, &method));
    assert_eq!(sub.len(), 3);
    assert!(sub[0].is_use() && sub[1].is_use() && sub[2].is_def());
    let local = sub[0].interval.expect("local interval");
    assert!(stream.interval(local).is_local());

    let ret = stream.node_positions(node(3, &method));
    assert_eq!(ret.len(), 1);
    assert_eq!(ret[0].candidates, RegMask::single(PReg::int(1)));
}

#[test]
fn overflow_internal_is_delay_free_and_flushed_after_uses() {
    let method = method_with(|b| {
        let x = b.local(VarType::Int, true);
        let a = b.lcl_var(x);
        let c = b.lcl_var(x);
        let sum = b.binary(BinOp::Add, a, c, VarType::Int);
        b.set_overflow(sum);
        b.mark_unused(sum);
    });
    let stream = build_ref_positions(&toy(), &method).expect("build");
    let add = stream.node_positions(node(2, &method));
    let kinds: Vec<_> = add.iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![RefKind::Use, RefKind::Use, RefKind::InternalDef, RefKind::Def]
    );
    assert!(add[2].delay_free);
    assert!(add[3].local_def_use);
    let internal = add[2].interval.expect("internal interval");
    assert_eq!(stream.interval(internal).kind, IntervalKind::Internal(node(2, &method)));
}

#[test]
fn finish_node_checks_declared_dst_count() {
    let method = method_with(|b| {
        let c = b.iconst(1, VarType::Int);
        b.mark_unused(c);
    });
    let target = Toy::new(TargetOptions::default());
    let mut ctx = BuildCtx::new(&method, &target);
    let n0 = node(0, &method);

    ctx.begin_node(n0);
    let err = ctx
        .finish_node(n0, NodeBuild::Built { src: 0, dst: 0 })
        .expect_err("unused value without a def");
    assert!(err.to_string().contains("unused value defines no register"));

    ctx.begin_node(n0);
    let err = ctx
        .finish_node(n0, NodeBuild::Built { src: 0, dst: 2 })
        .expect_err("two defs on a scalar");
    assert!(err.to_string().contains("single-register node"));
}

#[test]
fn leftover_internal_requests_are_flushed() {
    let method = method_with(|b| {
        b.push(Op::MemoryBarrier, VarType::Void);
    });
    let target = Toy::new(TargetOptions::default());
    let mut ctx = BuildCtx::new(&method, &target);
    let n0 = node(0, &method);

    ctx.begin_node(n0);
    ctx.internal_int(RegMask::single(PReg::int(5)));
    assert_eq!(ctx.internal().len(), 1);
    ctx.finish_node(n0, NodeBuild::Built { src: 0, dst: 0 })
        .expect("finish");
    assert!(ctx.internal().is_empty());
    let stream = ctx.into_stream();
    let positions = stream.node_positions(n0);
    assert_eq!(positions.len(), 1);
    assert!(positions[0].is_internal());
    assert_eq!(positions[0].candidates, RegMask::single(PReg::int(5)));
}

#[test]
fn call_uses_placed_arguments() {
    let method = method_with(|b| {
        let v = b.iconst(1, VarType::Long);
        let arg = b.putarg_reg(v, 1);
        b.call(CallInfo::user(CallTarget::Direct, vec![arg]), VarType::Int);
    });
    let stream = build_ref_positions(&toy(), &method).expect("build");

    let putarg = stream.node_positions(node(1, &method));
    assert_eq!(putarg[0].candidates, RegMask::single(PReg::int(2)));
    assert_eq!(putarg[1].candidates, RegMask::single(PReg::int(2)));

    let call = stream.node_positions(node(2, &method));
    assert!(call[0].is_use());
    assert_eq!(call[0].candidates, RegMask::single(PReg::int(2)));
    let kills = call[1].kill_set().expect("call kills");
    assert!(kills.regs.contains(PReg::float(1)));
    assert!(call[2].is_def());
    assert_eq!(call[2].candidates, RegMask::single(PReg::int(1)));
}

#[test]
fn unplaced_argument_is_a_violation() {
    // The second call reuses an argument placed for the first one.
    let method = method_with(|b| {
        let v = b.iconst(1, VarType::Long);
        let arg = b.putarg_reg(v, 0);
        b.call(CallInfo::user(CallTarget::Direct, vec![arg]), VarType::Void);
        b.call(CallInfo::user(CallTarget::Direct, vec![arg]), VarType::Void);
    });
    let err = build_ref_positions(&toy(), &method).expect_err("stale argument");
    assert!(matches!(err, BuildError::InvariantViolation { .. }));
    assert!(err.to_string().contains("was not placed"));
}

#[test]
fn multi_reg_call_defines_each_return_register() {
    let method = method_with(|b| {
        let info = CallInfo {
            multi_reg_return: Some(ReturnTypeDesc::new(&[VarType::Long, VarType::Long])),
            ..CallInfo::user(CallTarget::Direct, vec![])
        };
        let call = b.call(info, VarType::Struct);
        b.ret(Some(call));
    });
    let stream = build_ref_positions(&toy(), &method).expect("build");
    let call = stream.node_positions(node(0, &method));
    let defs: Vec<_> = call.iter().filter(|p| p.is_def()).collect();
    assert_eq!(defs.len(), 2);
    assert_eq!(defs[0].candidates, RegMask::single(PReg::int(1)));
    assert_eq!(defs[1].candidates, RegMask::single(PReg::int(2)));
    assert_eq!(defs[1].multi_reg_idx, 1);
    assert_eq!(stream.run_of(node(0, &method)).map(|r| r.dst_count), Some(2));

    let ret = stream.node_positions(node(1, &method));
    assert_eq!(ret.len(), 2);
    assert_eq!(ret[1].candidates, RegMask::single(PReg::int(2)));
}

#[test]
fn store_to_candidate_local_defines_the_local() {
    let method = method_with(|b| {
        let x = b.local(VarType::Int, true);
        let c = b.iconst(9, VarType::Int);
        b.store_lcl_var(x, c);
        let load = b.lcl_var(x);
        b.ret(Some(load));
    });
    let stream = build_ref_positions(&toy(), &method).expect("build");
    let store = stream.node_positions(node(1, &method));
    assert_eq!(store.len(), 2);
    let local = store[1].interval.expect("local def");
    assert!(stream.interval(local).is_local());
    // The return reads the same local interval.
    let ret = stream.node_positions(node(3, &method));
    assert_eq!(ret[0].interval, Some(local));
    assert_eq!(stream.run_of(node(1, &method)).map(|r| r.dst_count), Some(0));
}

#[test]
fn write_barrier_uses_fixed_registers() {
    let method = method_with(|b| {
        let obj = b.local(VarType::Ref, true);
        let dst = b.lcl_var(obj);
        let val = b.lcl_var(obj);
        b.store_ind(dst, val, VarType::Ref);
    });
    let stream = build_ref_positions(&toy(), &method).expect("build");
    let store = stream.node_positions(node(2, &method));
    assert_eq!(store.len(), 3);
    assert_eq!(store[0].candidates, RegMask::single(PReg::int(3)));
    assert_eq!(store[1].candidates, RegMask::single(PReg::int(4)));
    assert!(store[2].kill_set().is_some());
    assert!(store.iter().all(|p| !p.is_def()));
}

#[test]
fn missing_operand_def_is_a_violation() {
    let method = method_with(|b| {
        let x = b.local(VarType::Int, false);
        let v = b.lcl_var(x);
        // A store produces nothing for a consumer to read.
        let store = b.store_lcl_var(x, v);
        b.unary(lsra_ir::node::UnOp::Neg, store, VarType::Int);
    });
    let err = build_ref_positions(&toy(), &method).expect_err("no def");
    assert!(err.to_string().contains("operand n1 has no register def"));
}
