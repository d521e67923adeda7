//! Target-agnostic register-requirement data.
//!
//! The register-requirement builder produces, per method, a
//! [`stream::RefPositionStream`]: an ordered list of reference positions
//! over intervals that a later allocation engine must satisfy. This crate
//! defines the vocabulary shared by the builder and the engine: register
//! classes, physical registers, register masks and kill sets.

pub mod stream;

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Register class: which register file a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegClass {
    Int,
    Float,
}

impl fmt::Display for RegClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegClass::Int => f.write_str("int"),
            RegClass::Float => f.write_str("float"),
        }
    }
}

/// A physical register, target-agnostic representation.
/// The `hw` field holds the hardware number within its class (0..31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PReg {
    pub class: RegClass,
    pub hw: u8,
}

impl PReg {
    pub const fn int(hw: u8) -> Self {
        Self {
            class: RegClass::Int,
            hw,
        }
    }

    pub const fn float(hw: u8) -> Self {
        Self {
            class: RegClass::Float,
            hw,
        }
    }

    /// Bit position of this register in a [`RegMask`].
    const fn bit(self) -> u32 {
        match self.class {
            RegClass::Int => self.hw as u32,
            RegClass::Float => 32 + self.hw as u32,
        }
    }
}

impl fmt::Display for PReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            RegClass::Int => write!(f, "r{}", self.hw),
            RegClass::Float => write!(f, "f{}", self.hw),
        }
    }
}

/// A set of physical registers of both classes.
///
/// Bits 0..32 are the integer registers, bits 32..64 the floating point
/// registers. On a reference position the empty mask means "any register
/// of the interval's class".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegMask(u64);

const INT_BITS: u64 = 0x0000_0000_FFFF_FFFF;

impl RegMask {
    pub const EMPTY: RegMask = RegMask(0);

    pub const fn single(reg: PReg) -> Self {
        RegMask(1 << reg.bit())
    }

    pub fn from_regs(regs: &[PReg]) -> Self {
        regs.iter().fold(RegMask::EMPTY, |m, &r| m | RegMask::single(r))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn contains(self, reg: PReg) -> bool {
        self.0 & (1 << reg.bit()) != 0
    }

    pub fn is_superset_of(self, other: RegMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Registers of `self` not in `other`.
    pub fn without(self, other: RegMask) -> Self {
        RegMask(self.0 & !other.0)
    }

    /// Restrict to one register class.
    pub fn of_class(self, class: RegClass) -> Self {
        match class {
            RegClass::Int => RegMask(self.0 & INT_BITS),
            RegClass::Float => RegMask(self.0 & !INT_BITS),
        }
    }

    /// Registers in ascending order, integer registers first.
    pub fn iter(self) -> impl Iterator<Item = PReg> {
        (0..64u32).filter(move |b| self.0 & (1 << b) != 0).map(|b| {
            if b < 32 {
                PReg::int(b as u8)
            } else {
                PReg::float((b - 32) as u8)
            }
        })
    }
}

impl BitOr for RegMask {
    type Output = RegMask;
    fn bitor(self, rhs: RegMask) -> RegMask {
        RegMask(self.0 | rhs.0)
    }
}

impl BitAnd for RegMask {
    type Output = RegMask;
    fn bitand(self, rhs: RegMask) -> RegMask {
        RegMask(self.0 & rhs.0)
    }
}

impl Not for RegMask {
    type Output = RegMask;
    fn not(self) -> RegMask {
        RegMask(!self.0)
    }
}

impl fmt::Display for RegMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, reg) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{reg}")?;
        }
        f.write_str("}")
    }
}

/// Registers a node destroys.
///
/// `regs` lose their contents across the node. `gc_refs` may still hold
/// a value afterwards but no longer a live GC reference, so the engine
/// must not keep a reference-typed interval there across the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KillSet {
    pub regs: RegMask,
    pub gc_refs: RegMask,
}

impl KillSet {
    pub const EMPTY: KillSet = KillSet {
        regs: RegMask::EMPTY,
        gc_refs: RegMask::EMPTY,
    };

    pub fn regs(regs: RegMask) -> Self {
        Self {
            regs,
            gc_refs: RegMask::EMPTY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty() && self.gc_refs.is_empty()
    }

    /// Every register the kill affects in any way.
    pub fn all(&self) -> RegMask {
        self.regs | self.gc_refs
    }
}

impl fmt::Display for KillSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.regs)?;
        if !self.gc_refs.is_empty() {
            write!(f, " gc {}", self.gc_refs)?;
        }
        Ok(())
    }
}
