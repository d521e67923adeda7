//! LoongArch64 register definitions.

use lsra_regalloc::{PReg, RegMask};

/// LoongArch64 general-purpose registers, by ABI name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Zero = 0,
    Ra = 1,
    Tp = 2,
    Sp = 3,
    A0 = 4,
    A1 = 5,
    A2 = 6,
    A3 = 7,
    A4 = 8,
    A5 = 9,
    A6 = 10,
    A7 = 11,
    T0 = 12,
    T1 = 13,
    T2 = 14,
    T3 = 15,
    T4 = 16,
    T5 = 17,
    T6 = 18,
    T7 = 19,
    T8 = 20,
    /// Reserved by the ABI.
    X = 21,
    Fp = 22,
    S0 = 23,
    S1 = 24,
    S2 = 25,
    S3 = 26,
    S4 = 27,
    S5 = 28,
    S6 = 29,
    S7 = 30,
    S8 = 31,
}

impl Gpr {
    pub const ARGS: [Gpr; 8] = [
        Gpr::A0,
        Gpr::A1,
        Gpr::A2,
        Gpr::A3,
        Gpr::A4,
        Gpr::A5,
        Gpr::A6,
        Gpr::A7,
    ];

    pub const TEMPS: [Gpr; 9] = [
        Gpr::T0,
        Gpr::T1,
        Gpr::T2,
        Gpr::T3,
        Gpr::T4,
        Gpr::T5,
        Gpr::T6,
        Gpr::T7,
        Gpr::T8,
    ];

    pub const SAVED: [Gpr; 9] = [
        Gpr::S0,
        Gpr::S1,
        Gpr::S2,
        Gpr::S3,
        Gpr::S4,
        Gpr::S5,
        Gpr::S6,
        Gpr::S7,
        Gpr::S8,
    ];

    /// Hardware register number.
    pub fn encoding(self) -> u8 {
        self as u8
    }

    pub fn preg(self) -> PReg {
        PReg::int(self as u8)
    }

    pub fn mask(self) -> RegMask {
        RegMask::single(self.preg())
    }

    pub fn name(self) -> &'static str {
        match self {
            Gpr::Zero => "zero",
            Gpr::Ra => "ra",
            Gpr::Tp => "tp",
            Gpr::Sp => "sp",
            Gpr::A0 => "a0",
            Gpr::A1 => "a1",
            Gpr::A2 => "a2",
            Gpr::A3 => "a3",
            Gpr::A4 => "a4",
            Gpr::A5 => "a5",
            Gpr::A6 => "a6",
            Gpr::A7 => "a7",
            Gpr::T0 => "t0",
            Gpr::T1 => "t1",
            Gpr::T2 => "t2",
            Gpr::T3 => "t3",
            Gpr::T4 => "t4",
            Gpr::T5 => "t5",
            Gpr::T6 => "t6",
            Gpr::T7 => "t7",
            Gpr::T8 => "t8",
            Gpr::X => "x",
            Gpr::Fp => "fp",
            Gpr::S0 => "s0",
            Gpr::S1 => "s1",
            Gpr::S2 => "s2",
            Gpr::S3 => "s3",
            Gpr::S4 => "s4",
            Gpr::S5 => "s5",
            Gpr::S6 => "s6",
            Gpr::S7 => "s7",
            Gpr::S8 => "s8",
        }
    }
}

/// LoongArch64 floating point register `f0..f31`.
///
/// `f0..f7` carry arguments and results (`fa0..fa7`), `f8..f23` are
/// temporaries (`ft0..ft15`) and `f24..f31` are callee-saved
/// (`fs0..fs7`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fpr(u8);

impl Fpr {
    pub const COUNT: u8 = 32;

    pub const fn new(hw: u8) -> Self {
        Fpr(hw & 31)
    }

    pub fn encoding(self) -> u8 {
        self.0
    }

    pub fn preg(self) -> PReg {
        PReg::float(self.0)
    }

    pub fn mask(self) -> RegMask {
        RegMask::single(self.preg())
    }

    pub fn name(self) -> String {
        match self.0 {
            0..=7 => format!("fa{}", self.0),
            8..=23 => format!("ft{}", self.0 - 8),
            _ => format!("fs{}", self.0 - 24),
        }
    }
}

/// Mask of a register list.
pub fn gpr_mask(regs: &[Gpr]) -> RegMask {
    regs.iter().fold(RegMask::EMPTY, |m, r| m | r.mask())
}

/// Mask of the floating point registers `lo..=hi`.
pub fn fpr_range(lo: u8, hi: u8) -> RegMask {
    (lo..=hi).fold(RegMask::EMPTY, |m, hw| m | Fpr::new(hw).mask())
}
