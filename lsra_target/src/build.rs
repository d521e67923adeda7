//! Shared build context for per-node register requirements.
//!
//! A [`BuildCtx`] owns the reference-position stream of one method while
//! it is being built. Target backends drive it one node at a time through
//! the helpers below; the helpers keep the position layout of a node
//! fixed: operand uses, then internal defs, then kills, then defs.

use log::trace;
use lsra_ir::method::Method;
use lsra_ir::node::{CallInfo, Helper, Op, ReturnTypeDesc};
use lsra_ir::types::VarType;
use lsra_ir::value::{LclNum, NodeRef};
use lsra_regalloc::stream::{IntervalId, IntervalKind, RefKind, RefPosition, RefPositionStream};
use lsra_regalloc::{KillSet, PReg, RegClass, RegMask};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::descriptor::{AbiRole, TargetDescriptor};
use crate::error::{BuildError, BuildResult};

/// Register class holding values of type `ty`.
pub fn class_of(ty: VarType) -> RegClass {
    if ty.uses_float_reg() {
        RegClass::Float
    } else {
        RegClass::Int
    }
}

/// What a backend built for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeBuild {
    /// Positions were built; `src` operand registers are read and `dst`
    /// registers defined.
    Built { src: u32, dst: u32 },
    /// Nothing is built at the node itself; its consumers reference it
    /// directly (register-candidate locals and contained locals).
    Deferred,
}

/// One pending internal register request.
#[derive(Debug, Clone, Copy)]
struct InternalRequest {
    class: RegClass,
    candidates: RegMask,
}

/// Internal registers requested for the node being built.
///
/// Requests accumulate while a handler runs and are flushed as
/// `InternalDef` positions once, after the node's operand uses. Nothing
/// survives past the node.
#[derive(Debug, Default)]
pub struct InternalRegs {
    requests: SmallVec<[InternalRequest; 4]>,
    delay_free: bool,
}

impl InternalRegs {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn clear(&mut self) {
        self.requests.clear();
        self.delay_free = false;
    }
}

/// Per-method build state.
pub struct BuildCtx<'a> {
    method: &'a Method,
    target: &'a dyn TargetDescriptor,
    stream: RefPositionStream,
    /// Interval defined by each register of each built node.
    defs: FxHashMap<(NodeRef, u8), IntervalId>,
    /// Intervals of register-candidate locals.
    locals: FxHashMap<LclNum, IntervalId>,
    internal: InternalRegs,
    /// Argument registers written by `PutArgReg` since the last call.
    placed_args: RegMask,
    run_start: u32,
}

impl<'a> BuildCtx<'a> {
    pub fn new(method: &'a Method, target: &'a dyn TargetDescriptor) -> Self {
        Self {
            method,
            target,
            stream: RefPositionStream::new(),
            defs: FxHashMap::default(),
            locals: FxHashMap::default(),
            internal: InternalRegs::default(),
            placed_args: RegMask::EMPTY,
            run_start: 0,
        }
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn target(&self) -> &'a dyn TargetDescriptor {
        self.target
    }

    pub fn stream(&self) -> &RefPositionStream {
        &self.stream
    }

    pub fn into_stream(self) -> RefPositionStream {
        self.stream
    }

    pub fn internal(&self) -> &InternalRegs {
        &self.internal
    }

    pub fn placed_args(&self) -> RegMask {
        self.placed_args
    }

    /// Error for a broken IR contract at the node being built.
    pub fn violation(&self, node: NodeRef, message: impl Into<String>) -> BuildError {
        BuildError::InvariantViolation {
            node,
            oper: self.method.node(node).op.name(),
            message: message.into(),
        }
    }

    /// Error for an operator with no register policy on this target.
    pub fn not_implemented(&self, node: NodeRef) -> BuildError {
        BuildError::NotImplemented {
            node,
            oper: self.method.node(node).op.name(),
            target: self.target.name(),
        }
    }

    // -- Node lifecycle --

    pub fn begin_node(&mut self, node: NodeRef) {
        self.internal.clear();
        trace!("building {node} {}", self.method.node(node).op.name());
        self.run_start = self.stream.next_index();
    }

    /// Close the node's run after checking the counts the handler reported
    /// against what the IR declares.
    pub fn finish_node(&mut self, node: NodeRef, built: NodeBuild) -> BuildResult<()> {
        let NodeBuild::Built { src, dst } = built else {
            if self.stream.next_index() != self.run_start {
                return Err(self.violation(node, "deferred node built positions"));
            }
            return Ok(());
        };
        if !self.internal.is_empty() {
            self.flush_internal(node);
        }

        let method = self.method;
        if dst >= 2 && !method.is_multi_reg_node(node) {
            return Err(self.violation(
                node,
                format!("{dst} destination registers on a single-register node"),
            ));
        }
        if method.is_unused_value(node) {
            if !method.is_value(node) {
                return Err(self.violation(node, "unused-value flag on a node without a value"));
            }
            if dst == 0 {
                return Err(self.violation(node, "unused value defines no register"));
            }
        }
        let declared = method.register_dst_count(node);
        if dst != declared {
            return Err(self.violation(
                node,
                format!("built {dst} destination registers, declared {declared}"),
            ));
        }

        self.stream.close_run(node, self.run_start, src, dst);
        trace!(
            "built {node} {}: src={src} dst={dst} positions={}",
            method.node(node).op.name(),
            self.stream.next_index() - self.run_start
        );
        Ok(())
    }

    fn push(
        &mut self,
        node: NodeRef,
        kind: RefKind,
        interval: Option<IntervalId>,
        candidates: RegMask,
    ) -> &mut RefPosition {
        self.stream.push(RefPosition {
            node,
            kind,
            interval,
            candidates,
            delay_free: false,
            multi_reg_idx: 0,
            local_def_use: false,
        });
        let last = self.stream.positions.len() - 1;
        &mut self.stream.positions[last]
    }

    // -- Internal registers --

    /// Request a node-private integer register.
    pub fn internal_int(&mut self, candidates: RegMask) {
        self.internal.requests.push(InternalRequest {
            class: RegClass::Int,
            candidates,
        });
    }

    /// Internal registers of this node must not share a register with
    /// its destination.
    pub fn set_internal_delay_free(&mut self) {
        self.internal.delay_free = true;
    }

    /// Emit the pending internal registers of `node`.
    pub fn flush_internal(&mut self, node: NodeRef) {
        let delay_free = self.internal.delay_free;
        let requests = std::mem::take(&mut self.internal.requests);
        for req in requests {
            let id = self
                .stream
                .new_interval(req.class, IntervalKind::Internal(node));
            self.stream.interval_mut(id).candidates = req.candidates;
            let pos = self.push(node, RefKind::InternalDef, Some(id), req.candidates);
            pos.delay_free = delay_free;
            trace!("  internal {id} {} for {node}", req.class);
        }
        self.internal.clear();
    }

    // -- Uses --

    fn local_interval(&mut self, lcl: LclNum) -> IntervalId {
        if let Some(&id) = self.locals.get(&lcl) {
            return id;
        }
        let class = class_of(self.method.local(lcl).ty);
        let id = self.stream.new_interval(class, IntervalKind::Local(lcl));
        self.locals.insert(lcl, id);
        id
    }

    /// Interval holding register `idx` of `operand`'s value.
    fn operand_interval(&mut self, user: NodeRef, operand: NodeRef, idx: u8) -> BuildResult<IntervalId> {
        let method = self.method;
        if let Op::LclVar(lcl) = method.node(operand).op
            && method.is_reg_candidate(lcl)
        {
            let local = method.local(lcl);
            if local.fields.is_empty() {
                return Ok(self.local_interval(lcl));
            }
            return match local.fields.get(idx as usize) {
                Some(&field) => Ok(self.local_interval(field)),
                None => Err(self.violation(user, format!("{operand} has no field {idx}"))),
            };
        }
        self.defs
            .get(&(operand, idx))
            .copied()
            .ok_or_else(|| self.violation(user, format!("operand {operand} has no register def")))
    }

    /// One use of register `idx` of `operand` by `user`.
    pub fn build_use_idx(
        &mut self,
        user: NodeRef,
        operand: NodeRef,
        candidates: RegMask,
        idx: u8,
    ) -> BuildResult<u32> {
        let id = self.operand_interval(user, operand, idx)?;
        let pos = self.push(user, RefKind::Use, Some(id), candidates);
        pos.multi_reg_idx = idx;
        Ok(1)
    }

    pub fn build_use(&mut self, user: NodeRef, operand: NodeRef, candidates: RegMask) -> BuildResult<u32> {
        self.build_use_idx(user, operand, candidates, 0)
    }

    /// Uses of an operand that may be contained: a contained operand is
    /// looked through to the registers its consumer reads.
    pub fn build_operand_uses(
        &mut self,
        user: NodeRef,
        operand: NodeRef,
        candidates: RegMask,
    ) -> BuildResult<u32> {
        let method = self.method;
        if !method.is_contained(operand) {
            return self.build_use(user, operand, candidates);
        }
        match &method.node(operand).op {
            Op::FieldList(items) => {
                let mut count = 0;
                for &item in items {
                    count += self.build_use(user, item, candidates)?;
                }
                Ok(count)
            }
            Op::Ind(addr) | Op::NullCheck(addr) | Op::Blk(addr) => {
                self.build_addr_uses(user, *addr, candidates)
            }
            Op::Lea(_) => self.build_addr_uses(user, operand, candidates),
            Op::Intrinsic(_, a) => self.build_use(user, *a, candidates),
            _ => Ok(0),
        }
    }

    /// Uses of an address: the address itself, or the base and index of
    /// a contained address mode.
    pub fn build_addr_uses(&mut self, user: NodeRef, addr: NodeRef, candidates: RegMask) -> BuildResult<u32> {
        let method = self.method;
        if !method.is_contained(addr) {
            return self.build_use(user, addr, candidates);
        }
        let Op::Lea(am) = method.node(addr).op else {
            return Ok(0);
        };
        let mut count = 0;
        if let Some(base) = am.base {
            count += self.build_operand_uses(user, base, candidates)?;
        }
        if let Some(index) = am.index {
            count += self.build_operand_uses(user, index, candidates)?;
        }
        Ok(count)
    }

    pub fn build_binary_uses(&mut self, user: NodeRef, a: NodeRef, b: NodeRef) -> BuildResult<u32> {
        let src = self.build_operand_uses(user, a, RegMask::EMPTY)?;
        Ok(src + self.build_operand_uses(user, b, RegMask::EMPTY)?)
    }

    // -- Defs and kills --

    fn def_interval_kind(&self, node: NodeRef) -> IntervalKind {
        match self.method.node(node).op {
            Op::CnsInt(_) | Op::CnsDbl(_) => IntervalKind::Constant(node),
            _ => IntervalKind::Temp(node),
        }
    }

    /// Define register `idx` of `node`'s value, of type `ty`.
    pub fn build_def_idx(
        &mut self,
        node: NodeRef,
        ty: VarType,
        candidates: RegMask,
        idx: u8,
    ) -> IntervalId {
        let kind = self.def_interval_kind(node);
        let id = self.stream.new_interval(class_of(ty), kind);
        let unused = self.method.is_unused_value(node);
        let pos = self.push(node, RefKind::Def, Some(id), candidates);
        pos.multi_reg_idx = idx;
        pos.local_def_use = unused;
        self.defs.insert((node, idx), id);
        id
    }

    /// Define the single-register value of `node`.
    pub fn build_def(&mut self, node: NodeRef, candidates: RegMask) -> IntervalId {
        let ty = self.method.node(node).ty;
        self.build_def_idx(node, ty, candidates, 0)
    }

    /// Define a register-candidate local (or one field of a promoted
    /// local) at a store.
    pub fn build_local_def(&mut self, node: NodeRef, lcl: LclNum, idx: u8) {
        let id = self.local_interval(lcl);
        let pos = self.push(node, RefKind::Def, Some(id), RegMask::EMPTY);
        pos.multi_reg_idx = idx;
    }

    pub fn build_kills(&mut self, node: NodeRef, kills: KillSet) {
        if !kills.is_empty() {
            self.push(node, RefKind::Kill(kills), None, RegMask::EMPTY);
        }
    }

    pub fn build_def_with_kills(&mut self, node: NodeRef, candidates: RegMask, kills: KillSet) -> IntervalId {
        self.build_kills(node, kills);
        self.build_def(node, candidates)
    }

    /// Kills of a call, then one def per return register.
    pub fn build_call_defs_with_kills(
        &mut self,
        node: NodeRef,
        desc: &ReturnTypeDesc,
        regs: &[PReg],
        kills: KillSet,
    ) {
        self.build_kills(node, kills);
        for (idx, (&ty, &reg)) in desc.regs.iter().zip(regs).enumerate() {
            self.build_def_idx(node, ty, RegMask::single(reg), idx as u8);
        }
    }

    // -- Shared policies --

    /// Uses of every non-contained operand, then a def if the node is a
    /// value.
    pub fn build_simple(&mut self, node: NodeRef) -> BuildResult<u32> {
        let mut src = 0;
        for operand in self.method.node(node).op.operands() {
            src += self.build_operand_uses(node, operand, RegMask::EMPTY)?;
        }
        if self.method.is_value(node) {
            self.build_def(node, RegMask::EMPTY);
        }
        Ok(src)
    }

    /// Comparison: operand uses, a def only when the result is a value.
    pub fn build_cmp(&mut self, node: NodeRef, a: NodeRef, b: NodeRef) -> BuildResult<u32> {
        let src = self.build_binary_uses(node, a, b)?;
        if self.method.node(node).ty != VarType::Void {
            self.build_def(node, RegMask::EMPTY);
        }
        Ok(src)
    }

    /// Register types of a multi-register operand.
    fn multi_reg_types(&self, operand: NodeRef) -> Option<ReturnTypeDesc> {
        let method = self.method;
        match &method.node(operand).op {
            Op::Call(call) => call.multi_reg_return.clone(),
            Op::LclVar(lcl) if method.is_multi_reg_node(operand) => {
                let tys: SmallVec<[VarType; 2]> = method
                    .local(*lcl)
                    .fields
                    .iter()
                    .map(|&f| method.local(f).ty)
                    .collect();
                Some(ReturnTypeDesc::new(&tys))
            }
            _ => None,
        }
    }

    /// Store to a local: the stored value's uses, then the local's def if
    /// it lives in a register. Multi-register stores define every field.
    pub fn build_store_loc(&mut self, node: NodeRef) -> BuildResult<u32> {
        let method = self.method;
        let (lcl, value) = match method.node(node).op {
            Op::StoreLclVar(lcl, value) | Op::StoreLclFld(lcl, _, value) => (lcl, value),
            _ => return Err(self.violation(node, "not a local store")),
        };

        if method.is_multi_reg_node(node) {
            let fields = method.local(lcl).fields.clone();
            let mut src = 0;
            if method.is_multi_reg_node(value) {
                for idx in 0..fields.len() {
                    src += self.build_use_idx(node, value, RegMask::EMPTY, idx as u8)?;
                }
            } else if let Op::FieldList(items) = &method.node(value).op {
                if items.len() != fields.len() {
                    return Err(self.violation(
                        node,
                        format!("{} values stored to {} fields", items.len(), fields.len()),
                    ));
                }
                for &item in items {
                    src += self.build_use(node, item, RegMask::EMPTY)?;
                }
            } else {
                return Err(self.violation(node, "multi-register store of a single-register value"));
            }
            for (idx, field) in fields.into_iter().enumerate() {
                self.build_local_def(node, field, idx as u8);
            }
            return Ok(src);
        }

        let candidate = method.is_reg_candidate(lcl);
        let src = if method.is_contained(value) {
            0
        } else {
            self.build_use(node, value, RegMask::EMPTY)?
        };
        if method.node(node).ty == VarType::Simd12 && !candidate {
            // The upper 4 bytes are stored separately.
            self.internal_int(RegMask::EMPTY);
        }
        self.flush_internal(node);
        if candidate && matches!(method.node(node).op, Op::StoreLclVar(..)) {
            self.build_local_def(node, lcl, 0);
        }
        Ok(src)
    }

    /// Return: the value is read from the convention's return register(s).
    pub fn build_return(&mut self, node: NodeRef) -> BuildResult<u32> {
        let method = self.method;
        let target = self.target;
        let Op::Return(Some(value)) = method.node(node).op else {
            return Ok(0);
        };
        if method.is_contained(value) {
            return Ok(0);
        }
        if method.is_multi_reg_node(value) {
            let Some(desc) = self.multi_reg_types(value) else {
                return Err(self.violation(node, "multi-register return without register types"));
            };
            let Some(regs) = target.abi_return_regs(&desc) else {
                return Err(self.violation(node, "return value needs more registers than the ABI has"));
            };
            for (idx, reg) in regs.into_iter().enumerate() {
                self.build_use_idx(node, value, RegMask::single(reg), idx as u8)?;
            }
            return Ok(desc.reg_count());
        }
        let reg = target.return_reg(method.node(value).ty);
        self.build_use(node, value, RegMask::single(reg))
    }

    /// Move into an argument register; the register counts as placed
    /// until the next call.
    pub fn build_putarg_reg(&mut self, node: NodeRef) -> BuildResult<u32> {
        let method = self.method;
        let Op::PutArgReg(value, slot) = method.node(node).op else {
            return Err(self.violation(node, "not a register argument"));
        };
        let class = class_of(method.node(node).ty);
        let Some(reg) = self.target.arg_reg(class, slot) else {
            return Err(self.violation(node, format!("no {class} argument register {slot}")));
        };
        let mask = RegMask::single(reg);
        self.build_use(node, value, mask)?;
        self.build_def(node, mask);
        self.placed_args = self.placed_args | mask;
        Ok(1)
    }

    /// Uses of a call's register arguments at their argument registers.
    /// Stack arguments were consumed by their own `PutArgStk` nodes.
    pub fn build_call_arg_uses(&mut self, node: NodeRef, call: &CallInfo) -> BuildResult<u32> {
        let method = self.method;
        let mut src = 0;
        for &arg in &call.args {
            match &method.node(arg).op {
                Op::PutArgReg(..) => src += self.build_placed_arg_use(node, arg)?,
                Op::FieldList(items) if method.is_contained(arg) => {
                    for &item in items {
                        src += self.build_placed_arg_use(node, item)?;
                    }
                }
                Op::PutArgStk(_) => {}
                _ => return Err(self.violation(node, format!("unexpected call argument {arg}"))),
            }
        }
        Ok(src)
    }

    fn build_placed_arg_use(&mut self, node: NodeRef, arg: NodeRef) -> BuildResult<u32> {
        let Op::PutArgReg(_, slot) = self.method.node(arg).op else {
            return Err(self.violation(node, format!("argument {arg} is not in a register")));
        };
        let class = class_of(self.method.node(arg).ty);
        let Some(reg) = self.target.arg_reg(class, slot) else {
            return Err(self.violation(node, format!("no {class} argument register {slot}")));
        };
        if !self.placed_args.contains(reg) {
            return Err(self.violation(node, format!("argument register {reg} was not placed")));
        }
        self.build_use(node, arg, RegMask::single(reg))
    }

    /// Calls clear the placed argument registers.
    pub fn reset_placed_args(&mut self) {
        self.placed_args = RegMask::EMPTY;
    }

    /// Reference store through the write-barrier helper: address and value
    /// in the helper's fixed registers, no result, helper kills.
    pub fn build_gc_write_barrier(&mut self, node: NodeRef) -> BuildResult<u32> {
        let method = self.method;
        let target = self.target;
        let Op::StoreInd { addr, data } = method.node(node).op else {
            return Err(self.violation(node, "write barrier on a non-store"));
        };
        if method.is_contained(addr) {
            return Err(self.violation(node, "write-barrier address must be in a register"));
        }
        if method.is_contained(data) {
            return Err(self.violation(node, "write-barrier value must be in a register"));
        }
        self.build_use(node, addr, target.roles().mask(AbiRole::WriteBarrierDst))?;
        self.build_use(node, data, target.roles().mask(AbiRole::WriteBarrierSrc))?;
        // Object references are known to be in the heap; anything else
        // might point to the stack.
        let helper = if method.node(addr).ty == VarType::Ref {
            Helper::WriteBarrier
        } else {
            Helper::CheckedWriteBarrier
        };
        self.build_kills(node, target.helper_kill_set(helper));
        Ok(2)
    }
}
