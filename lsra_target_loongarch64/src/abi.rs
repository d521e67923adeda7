//! LoongArch64 target descriptor: register file, calling convention and
//! runtime helper contracts.

use lsra_ir::node::Helper;
use lsra_regalloc::{KillSet, PReg, RegClass, RegMask};
use lsra_target::descriptor::{AbiRole, FixedRoles, TargetDescriptor};
use lsra_target::options::TargetOptions;

use crate::reg::{Fpr, Gpr, fpr_range, gpr_mask};

/// Integer register width in bytes.
pub const REGSIZE_BYTES: u32 = 8;
/// Floating point / vector register width in bytes.
pub const FP_REGSIZE_BYTES: u32 = 16;
pub const STACK_ALIGN: u32 = 16;

/// Whether `value` fits a signed 12-bit immediate.
pub fn is_valid_simm12(value: i64) -> bool {
    (-2048..=2047).contains(&value)
}

fn role_reg(role: AbiRole) -> PReg {
    match role {
        AbiRole::IntReturn | AbiRole::LongReturn | AbiRole::ExceptionObject => Gpr::A0.preg(),
        AbiRole::IntReturnSecondary => Gpr::A1.preg(),
        AbiRole::AsyncContinuationReturn => Gpr::A2.preg(),
        AbiRole::FloatReturn => Fpr::new(0).preg(),
        AbiRole::FloatReturnSecondary => Fpr::new(1).preg(),
        AbiRole::WriteBarrierDst | AbiRole::WriteBarrierDstByref => Gpr::T6.preg(),
        AbiRole::WriteBarrierSrc | AbiRole::WriteBarrierSrcByref => Gpr::T7.preg(),
        AbiRole::R2rIndirectParam => Gpr::T8.preg(),
        AbiRole::GsCookieTmp0 => Gpr::T0.preg(),
        AbiRole::GsCookieTmp1 => Gpr::T1.preg(),
    }
}

/// The LoongArch64 target.
#[derive(Debug, Clone)]
pub struct LoongArch64 {
    options: TargetOptions,
    roles: FixedRoles,
}

impl Default for LoongArch64 {
    fn default() -> Self {
        Self::new(TargetOptions::default())
    }
}

impl LoongArch64 {
    pub fn new(options: TargetOptions) -> Self {
        Self {
            options,
            roles: FixedRoles::from_fn(role_reg),
        }
    }

    /// Registers clobbered by the write-barrier helpers.
    fn write_barrier_trash() -> RegMask {
        gpr_mask(&[Gpr::T0, Gpr::T1, Gpr::T6, Gpr::T7])
    }

    fn arg_regs() -> RegMask {
        gpr_mask(&Gpr::ARGS) | fpr_range(0, 7)
    }

    fn all_callee_trash(&self) -> RegMask {
        self.callee_trash(RegClass::Int) | self.callee_trash(RegClass::Float)
    }
}

impl TargetDescriptor for LoongArch64 {
    fn name(&self) -> &'static str {
        "loongarch64"
    }

    fn options(&self) -> &TargetOptions {
        &self.options
    }

    fn reg_size(&self) -> u32 {
        REGSIZE_BYTES
    }

    fn fp_reg_size(&self) -> u32 {
        FP_REGSIZE_BYTES
    }

    fn stack_align(&self) -> u32 {
        STACK_ALIGN
    }

    fn is_valid_imm_offset(&self, offset: i64) -> bool {
        is_valid_simm12(offset)
    }

    fn allocatable(&self, class: RegClass) -> RegMask {
        match class {
            RegClass::Int => gpr_mask(&Gpr::ARGS) | gpr_mask(&Gpr::TEMPS) | gpr_mask(&Gpr::SAVED),
            RegClass::Float => fpr_range(0, Fpr::COUNT - 1),
        }
    }

    fn callee_trash(&self, class: RegClass) -> RegMask {
        match class {
            RegClass::Int => gpr_mask(&Gpr::ARGS) | gpr_mask(&Gpr::TEMPS),
            RegClass::Float => fpr_range(0, 23),
        }
    }

    fn callee_saved(&self, class: RegClass) -> RegMask {
        match class {
            RegClass::Int => gpr_mask(&Gpr::SAVED) | Gpr::Fp.mask(),
            RegClass::Float => fpr_range(24, 31),
        }
    }

    fn roles(&self) -> &FixedRoles {
        &self.roles
    }

    fn arg_reg(&self, class: RegClass, slot: u8) -> Option<PReg> {
        if slot >= 8 {
            return None;
        }
        Some(match class {
            RegClass::Int => Gpr::ARGS[slot as usize].preg(),
            RegClass::Float => Fpr::new(slot).preg(),
        })
    }

    fn helper_kill_set(&self, helper: Helper) -> KillSet {
        let regs = match helper {
            // Preserves the return registers of the interrupted code.
            Helper::StopForGc => self.all_callee_trash().without(
                gpr_mask(&[Gpr::A0, Gpr::A1]) | Fpr::new(0).mask() | Fpr::new(1).mask(),
            ),
            Helper::WriteBarrier | Helper::CheckedWriteBarrier | Helper::AssignByref => {
                Self::write_barrier_trash()
            }
            Helper::ProfilerEnter | Helper::ProfilerLeave | Helper::ProfilerTailcall => {
                self.all_callee_trash().without(Self::arg_regs())
            }
            Helper::Runtime(_) => self.all_callee_trash(),
        };
        KillSet::regs(regs)
    }
}
