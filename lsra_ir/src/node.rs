//! Node definitions for the lowered IR.
//!
//! Every node carries its operator and operands in one closed tagged
//! variant (`Op`). Lowering has already decided containment and
//! addressing modes; those decisions are recorded in `NodeFlags` and in
//! the shape of the operands (e.g. a contained `Lea` feeding an `Ind`).

use smallvec::SmallVec;

use crate::types::VarType;
use crate::value::{LclNum, NodeRef};

/// Per-node flags decided upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    /// Computed as part of its consumer's instruction.
    pub contained: bool,
    /// Produces a value that no other node consumes.
    pub unused_value: bool,
    /// Arithmetic must trap on overflow.
    pub overflow: bool,
    /// Result (or stored value) occupies more than one register.
    pub multi_reg: bool,
}

/// A single IR node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: Op,
    pub ty: VarType,
    pub flags: NodeFlags,
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    UDiv,
    Mod,
    UMod,
    /// High half of a widening multiply.
    MulHi,
    And,
    /// `a & !b`
    AndNot,
    Or,
    Xor,
    Lsh,
    /// Arithmetic right shift.
    Rsh,
    /// Logical right shift.
    Rsz,
    Ror,
}

impl BinOp {
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::UDiv => "udiv",
            BinOp::Mod => "mod",
            BinOp::UMod => "umod",
            BinOp::MulHi => "mulhi",
            BinOp::And => "and",
            BinOp::AndNot => "and_not",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Lsh => "lsh",
            BinOp::Rsh => "rsh",
            BinOp::Rsz => "rsz",
            BinOp::Ror => "ror",
        }
    }

    /// Division family: never fused with an operand.
    pub fn is_division(self) -> bool {
        matches!(self, BinOp::Div | BinOp::UDiv | BinOp::Mod | BinOp::UMod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

/// Comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
}

impl CmpOp {
    pub fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Ge => "ge",
            CmpOp::Gt => "gt",
        }
    }
}

/// Math intrinsics that survive to register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathIntrinsic {
    Abs,
    Ceiling,
    Floor,
    Round,
    Sqrt,
    Sin,
    Cos,
    Pow,
}

impl MathIntrinsic {
    pub fn name(self) -> &'static str {
        match self {
            MathIntrinsic::Abs => "abs",
            MathIntrinsic::Ceiling => "ceiling",
            MathIntrinsic::Floor => "floor",
            MathIntrinsic::Round => "round",
            MathIntrinsic::Sqrt => "sqrt",
            MathIntrinsic::Sin => "sin",
            MathIntrinsic::Cos => "cos",
            MathIntrinsic::Pow => "pow",
        }
    }
}

/// Interlocked read-modify-write operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    LockAdd,
    XorR,
    XAnd,
    XAdd,
    Xchg,
}

/// Runtime helpers reachable through a call node.
///
/// Helpers have their own kill sets; anything without a dedicated
/// contract is a `Runtime` helper and kills like a managed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    StopForGc,
    WriteBarrier,
    CheckedWriteBarrier,
    /// Byref-to-byref reference copy used by reference block copies.
    AssignByref,
    ProfilerEnter,
    ProfilerLeave,
    ProfilerTailcall,
    Runtime(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    User,
    Helper(Helper),
}

/// How a call finds its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// Direct call to a known entry point.
    Direct,
    /// Indirect call through a computed address.
    Indirect(NodeRef),
    /// Control expression materialized by lowering.
    Control(NodeRef),
    /// Ready-to-run or virtual stub call through an indirection cell
    /// held in a fixed register.
    IndirectCell,
}

/// Per-register types of a value returned in more than one register.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnTypeDesc {
    pub regs: SmallVec<[VarType; 2]>,
}

impl ReturnTypeDesc {
    pub fn new(regs: &[VarType]) -> Self {
        Self {
            regs: regs.iter().copied().collect(),
        }
    }

    pub fn reg_count(&self) -> u32 {
        self.regs.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub kind: CallKind,
    pub target: CallTarget,
    /// Late arguments in ABI order: `PutArgReg`, `PutArgStk`, or a
    /// contained `FieldList` of `PutArgReg`s.
    pub args: Vec<NodeRef>,
    pub fast_tail_call: bool,
    /// The call is a GC safepoint: register-resident references die.
    pub gc_interruptible: bool,
    pub multi_reg_return: Option<ReturnTypeDesc>,
}

impl CallInfo {
    pub fn user(target: CallTarget, args: Vec<NodeRef>) -> Self {
        Self {
            kind: CallKind::User,
            target,
            args,
            fast_tail_call: false,
            gc_interruptible: true,
            multi_reg_return: None,
        }
    }

    pub fn helper(helper: Helper, args: Vec<NodeRef>) -> Self {
        Self {
            kind: CallKind::Helper(helper),
            target: CallTarget::Direct,
            args,
            fast_tail_call: false,
            gc_interruptible: matches!(helper, Helper::Runtime(_) | Helper::StopForGc),
            multi_reg_return: None,
        }
    }

    pub fn helper_kind(&self) -> Option<Helper> {
        match self.kind {
            CallKind::Helper(h) => Some(h),
            CallKind::User => None,
        }
    }
}

/// Address mode `[base + index * scale + offset]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddrMode {
    pub base: Option<NodeRef>,
    pub index: Option<NodeRef>,
    pub scale: u8,
    pub offset: i32,
}

/// Code generation strategy chosen by lowering for a block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlkOpKind {
    /// Straight-line stores.
    Unroll,
    /// Counted store loop.
    Loop,
    /// Unrolled copy of a struct containing GC references, through the
    /// write-barrier byref registers.
    CpObjUnroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlkInfo {
    /// Destination address.
    pub addr: NodeRef,
    /// Init: fill value (possibly a contained `InitVal`).
    /// Copy: source, typically a contained `Ind` of the source address.
    pub data: NodeRef,
    pub size: u32,
    pub kind: BlkOpKind,
    pub init: bool,
    pub has_gc_ptrs: bool,
}

/// Node operators.
///
/// The operator set is fixed; consumers match on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    // -- Locals --
    LclVar(LclNum),
    LclFld(LclNum, u16),
    LclAddr(LclNum, u16),
    StoreLclVar(LclNum, NodeRef),
    StoreLclFld(LclNum, u16, NodeRef),
    /// Multi-register aggregate operand; always contained.
    FieldList(Vec<NodeRef>),

    // -- Markers --
    NoOp,
    Nop,
    StartNonGc,
    StartPreemptGc,
    ProfHook,
    MemoryBarrier,

    // -- Constants --
    CnsInt(i64),
    CnsDbl(f64),

    // -- Front-end forms that lowering must have removed --
    Box(NodeRef),
    Comma(NodeRef, NodeRef),
    Qmark(NodeRef, NodeRef),
    Colon(NodeRef, NodeRef),

    // -- Control flow --
    Return(Option<NodeRef>),
    RetFilt(Option<NodeRef>),
    KeepAlive(NodeRef),
    JTrue(NodeRef),
    Jmp,
    Switch(NodeRef),
    JmpTable,
    SwitchTable(NodeRef, NodeRef),
    ReturnTrap(NodeRef),

    // -- Arithmetic --
    Binary(BinOp, NodeRef, NodeRef),
    Unary(UnOp, NodeRef),
    Intrinsic(MathIntrinsic, NodeRef),
    HwIntrinsic(Vec<NodeRef>),
    Cast(NodeRef),
    Bitcast(NodeRef),
    Cmp(CmpOp, NodeRef, NodeRef),
    /// Fused compare-and-branch.
    JCmp(CmpOp, NodeRef, NodeRef),
    Select(NodeRef, NodeRef, NodeRef),
    CkFinite(NodeRef),

    // -- Atomics --
    CmpXchg {
        addr: NodeRef,
        value: NodeRef,
        comparand: NodeRef,
    },
    Atomic(AtomicOp, NodeRef, NodeRef),

    // -- Calls --
    PutArgStk(NodeRef),
    /// Move a value into argument register number `slot` of its class.
    PutArgReg(NodeRef, u8),
    Call(Box<CallInfo>),

    // -- Memory --
    Blk(NodeRef),
    StoreBlk(Box<BlkInfo>),
    InitVal(NodeRef),
    LclHeap(NodeRef),
    BoundsCheck {
        index: NodeRef,
        length: NodeRef,
    },
    ArrElem(Vec<NodeRef>),
    Lea(AddrMode),
    StoreInd {
        addr: NodeRef,
        data: NodeRef,
    },
    Ind(NodeRef),
    NullCheck(NodeRef),
    IndexAddr(NodeRef, NodeRef),

    // -- Exception handling / async --
    CatchArg,
    AsyncContinuation,
}

impl Op {
    /// Operator name used in dumps and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Op::LclVar(..) => "lcl_var",
            Op::LclFld(..) => "lcl_fld",
            Op::LclAddr(..) => "lcl_addr",
            Op::StoreLclVar(..) => "store_lcl_var",
            Op::StoreLclFld(..) => "store_lcl_fld",
            Op::FieldList(_) => "field_list",
            Op::NoOp => "no_op",
            Op::Nop => "nop",
            Op::StartNonGc => "start_nongc",
            Op::StartPreemptGc => "start_preemptgc",
            Op::ProfHook => "prof_hook",
            Op::MemoryBarrier => "memory_barrier",
            Op::CnsInt(_) => "cns_int",
            Op::CnsDbl(_) => "cns_dbl",
            Op::Box(_) => "box",
            Op::Comma(..) => "comma",
            Op::Qmark(..) => "qmark",
            Op::Colon(..) => "colon",
            Op::Return(_) => "return",
            Op::RetFilt(_) => "retfilt",
            Op::KeepAlive(_) => "keepalive",
            Op::JTrue(_) => "jtrue",
            Op::Jmp => "jmp",
            Op::Switch(_) => "switch",
            Op::JmpTable => "jmptable",
            Op::SwitchTable(..) => "switch_table",
            Op::ReturnTrap(_) => "return_trap",
            Op::Binary(op, ..) => op.name(),
            Op::Unary(UnOp::Neg, _) => "neg",
            Op::Unary(UnOp::Not, _) => "not",
            Op::Intrinsic(..) => "intrinsic",
            Op::HwIntrinsic(_) => "hwintrinsic",
            Op::Cast(_) => "cast",
            Op::Bitcast(_) => "bitcast",
            Op::Cmp(op, ..) => op.name(),
            Op::JCmp(..) => "jcmp",
            Op::Select(..) => "select",
            Op::CkFinite(_) => "ckfinite",
            Op::CmpXchg { .. } => "cmpxchg",
            Op::Atomic(AtomicOp::LockAdd, ..) => "lockadd",
            Op::Atomic(AtomicOp::XorR, ..) => "xorr",
            Op::Atomic(AtomicOp::XAnd, ..) => "xand",
            Op::Atomic(AtomicOp::XAdd, ..) => "xadd",
            Op::Atomic(AtomicOp::Xchg, ..) => "xchg",
            Op::PutArgStk(_) => "putarg_stk",
            Op::PutArgReg(..) => "putarg_reg",
            Op::Call(_) => "call",
            Op::Blk(_) => "blk",
            Op::StoreBlk(_) => "store_blk",
            Op::InitVal(_) => "init_val",
            Op::LclHeap(_) => "lclheap",
            Op::BoundsCheck { .. } => "bounds_check",
            Op::ArrElem(_) => "arr_elem",
            Op::Lea(_) => "lea",
            Op::StoreInd { .. } => "storeind",
            Op::Ind(_) => "ind",
            Op::NullCheck(_) => "nullcheck",
            Op::IndexAddr(..) => "index_addr",
            Op::CatchArg => "catch_arg",
            Op::AsyncContinuation => "async_continuation",
        }
    }

    /// Data operands in evaluation order.
    pub fn operands(&self) -> SmallVec<[NodeRef; 4]> {
        let mut ops = SmallVec::new();
        match self {
            Op::LclVar(..)
            | Op::LclFld(..)
            | Op::LclAddr(..)
            | Op::NoOp
            | Op::Nop
            | Op::StartNonGc
            | Op::StartPreemptGc
            | Op::ProfHook
            | Op::MemoryBarrier
            | Op::CnsInt(_)
            | Op::CnsDbl(_)
            | Op::Jmp
            | Op::JmpTable
            | Op::CatchArg
            | Op::AsyncContinuation
            | Op::Return(None)
            | Op::RetFilt(None) => {}
            Op::StoreLclVar(_, v) | Op::StoreLclFld(_, _, v) => ops.push(*v),
            Op::Box(a)
            | Op::Return(Some(a))
            | Op::RetFilt(Some(a))
            | Op::KeepAlive(a)
            | Op::JTrue(a)
            | Op::Switch(a)
            | Op::ReturnTrap(a)
            | Op::Unary(_, a)
            | Op::Intrinsic(_, a)
            | Op::Cast(a)
            | Op::Bitcast(a)
            | Op::CkFinite(a)
            | Op::PutArgStk(a)
            | Op::PutArgReg(a, _)
            | Op::Blk(a)
            | Op::InitVal(a)
            | Op::LclHeap(a)
            | Op::Ind(a)
            | Op::NullCheck(a) => ops.push(*a),
            Op::Comma(a, b)
            | Op::Qmark(a, b)
            | Op::Colon(a, b)
            | Op::SwitchTable(a, b)
            | Op::Binary(_, a, b)
            | Op::Cmp(_, a, b)
            | Op::JCmp(_, a, b)
            | Op::Atomic(_, a, b)
            | Op::IndexAddr(a, b) => {
                ops.push(*a);
                ops.push(*b);
            }
            Op::Select(c, a, b) => {
                ops.push(*c);
                ops.push(*a);
                ops.push(*b);
            }
            Op::CmpXchg {
                addr,
                value,
                comparand,
            } => {
                ops.push(*addr);
                ops.push(*value);
                ops.push(*comparand);
            }
            Op::FieldList(items) | Op::HwIntrinsic(items) | Op::ArrElem(items) => {
                ops.extend(items.iter().copied());
            }
            Op::Call(call) => {
                ops.extend(call.args.iter().copied());
                if let CallTarget::Indirect(t) | CallTarget::Control(t) = call.target {
                    ops.push(t);
                }
            }
            Op::StoreBlk(blk) => {
                ops.push(blk.addr);
                ops.push(blk.data);
            }
            Op::BoundsCheck { index, length } => {
                ops.push(*index);
                ops.push(*length);
            }
            Op::Lea(am) => {
                ops.extend(am.base);
                ops.extend(am.index);
            }
            Op::StoreInd { addr, data } => {
                ops.push(*addr);
                ops.push(*data);
            }
        }
        ops
    }

    /// Whether this operator can produce a value at all.
    ///
    /// Stores, branches and markers never do, regardless of the type
    /// they carry (a store keeps the type of the stored value).
    pub fn can_produce_value(&self) -> bool {
        !matches!(
            self,
            Op::StoreLclVar(..)
                | Op::StoreLclFld(..)
                | Op::StoreInd { .. }
                | Op::StoreBlk(_)
                | Op::NoOp
                | Op::Nop
                | Op::StartNonGc
                | Op::StartPreemptGc
                | Op::ProfHook
                | Op::MemoryBarrier
                | Op::Return(_)
                | Op::RetFilt(_)
                | Op::KeepAlive(_)
                | Op::JTrue(_)
                | Op::Jmp
                | Op::Switch(_)
                | Op::SwitchTable(..)
                | Op::ReturnTrap(_)
                | Op::JCmp(..)
                | Op::PutArgStk(_)
                | Op::BoundsCheck { .. }
                | Op::NullCheck(_)
                | Op::Atomic(AtomicOp::LockAdd, ..)
        )
    }
}
