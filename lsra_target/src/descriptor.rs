//! Target descriptor: pure queries about the target's registers and ABI.
//!
//! A descriptor is built once per process and shared by every method
//! build, so it must be immutable and `Sync`.

use lsra_ir::node::{CallInfo, Helper, ReturnTypeDesc};
use lsra_ir::types::VarType;
use lsra_regalloc::{KillSet, PReg, RegClass, RegMask};
use smallvec::SmallVec;

use crate::options::TargetOptions;

/// Registers with a fixed meaning in the calling convention or in a
/// runtime helper contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiRole {
    IntReturn,
    IntReturnSecondary,
    LongReturn,
    FloatReturn,
    FloatReturnSecondary,
    /// Holds the exception object on entry to a catch handler.
    ExceptionObject,
    /// Continuation returned by an async call.
    AsyncContinuationReturn,
    WriteBarrierDst,
    WriteBarrierSrc,
    WriteBarrierDstByref,
    WriteBarrierSrcByref,
    /// Stub or indirection-cell address for R2R and virtual stub calls.
    R2rIndirectParam,
    GsCookieTmp0,
    GsCookieTmp1,
}

impl AbiRole {
    pub const COUNT: usize = 14;

    pub const ALL: [AbiRole; AbiRole::COUNT] = [
        AbiRole::IntReturn,
        AbiRole::IntReturnSecondary,
        AbiRole::LongReturn,
        AbiRole::FloatReturn,
        AbiRole::FloatReturnSecondary,
        AbiRole::ExceptionObject,
        AbiRole::AsyncContinuationReturn,
        AbiRole::WriteBarrierDst,
        AbiRole::WriteBarrierSrc,
        AbiRole::WriteBarrierDstByref,
        AbiRole::WriteBarrierSrcByref,
        AbiRole::R2rIndirectParam,
        AbiRole::GsCookieTmp0,
        AbiRole::GsCookieTmp1,
    ];
}

/// Total map from ABI role to physical register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRoles {
    regs: [PReg; AbiRole::COUNT],
}

impl FixedRoles {
    /// Build the table by asking `reg_for` about every role once.
    pub fn from_fn(mut reg_for: impl FnMut(AbiRole) -> PReg) -> Self {
        Self {
            regs: AbiRole::ALL.map(&mut reg_for),
        }
    }

    pub fn get(&self, role: AbiRole) -> PReg {
        self.regs[role as usize]
    }

    pub fn mask(&self, role: AbiRole) -> RegMask {
        RegMask::single(self.get(role))
    }
}

/// Register file and ABI description of a target.
pub trait TargetDescriptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn options(&self) -> &TargetOptions;

    /// Width of an integer register in bytes.
    fn reg_size(&self) -> u32;

    /// Width of a floating point register in bytes.
    fn fp_reg_size(&self) -> u32;

    fn stack_align(&self) -> u32;

    fn page_size(&self) -> u32 {
        self.options().page_size
    }

    /// Whether `offset` fits the immediate field of a load, store or add.
    fn is_valid_imm_offset(&self, offset: i64) -> bool;

    /// Registers the allocation engine may hand out.
    fn allocatable(&self, class: RegClass) -> RegMask;

    /// Registers a callee may clobber.
    fn callee_trash(&self, class: RegClass) -> RegMask;

    /// Registers a callee must preserve.
    fn callee_saved(&self, class: RegClass) -> RegMask;

    fn roles(&self) -> &FixedRoles;

    fn fixed_reg(&self, role: AbiRole) -> PReg {
        self.roles().get(role)
    }

    /// Argument register number `slot` of `class`, if the convention has
    /// that many.
    fn arg_reg(&self, class: RegClass, slot: u8) -> Option<PReg>;

    /// Registers destroyed by a runtime helper.
    fn helper_kill_set(&self, helper: Helper) -> KillSet;

    /// Registers destroyed by a call.
    fn call_kill_set(&self, call: &CallInfo) -> KillSet {
        let mut kills = match call.helper_kind() {
            Some(helper) => self.helper_kill_set(helper),
            None => KillSet::regs(
                self.callee_trash(RegClass::Int) | self.callee_trash(RegClass::Float),
            ),
        };
        if call.gc_interruptible && self.options().gc_interruptible_kills_refs {
            kills.gc_refs = kills.gc_refs | self.allocatable(RegClass::Int);
        }
        kills
    }

    /// Return register for a single-register value of type `ty`.
    fn return_reg(&self, ty: VarType) -> PReg {
        if ty.uses_float_reg() {
            self.fixed_reg(AbiRole::FloatReturn)
        } else if ty == VarType::Long {
            self.fixed_reg(AbiRole::LongReturn)
        } else {
            self.fixed_reg(AbiRole::IntReturn)
        }
    }

    /// Return registers of a multi-register value, one per entry of
    /// `desc`. Integer and floating point parts are assigned from
    /// separate sequences. `None` if the convention has too few.
    fn abi_return_regs(&self, desc: &ReturnTypeDesc) -> Option<SmallVec<[PReg; 2]>> {
        let ints = [AbiRole::IntReturn, AbiRole::IntReturnSecondary];
        let floats = [AbiRole::FloatReturn, AbiRole::FloatReturnSecondary];
        let (mut next_int, mut next_float) = (0, 0);
        let mut regs = SmallVec::new();
        for ty in &desc.regs {
            let role = if ty.uses_float_reg() {
                next_float += 1;
                floats.get(next_float - 1)?
            } else {
                next_int += 1;
                ints.get(next_int - 1)?
            };
            regs.push(self.fixed_reg(*role));
        }
        Some(regs)
    }
}
