//! Type system for the lowered IR.
//!
//! Types are machine-level: every value type maps onto one register
//! class and a fixed size. `Ref` and `Byref` are tracked by the
//! garbage collector.

use std::fmt;

/// The static type of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    /// No value.
    Void,
    Bool,
    Byte,
    Short,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// Object reference (GC-tracked).
    Ref,
    /// Interior pointer (GC-tracked).
    Byref,
    Float,
    Double,
    Simd8,
    /// Three-lane float vector: 12 bytes, moved as an 8 + 4 byte pair.
    Simd12,
    Simd16,
    /// Aggregate value; only legal on contained or multi-register nodes.
    Struct,
}

impl VarType {
    /// IEEE floating point scalar.
    pub fn is_floating(self) -> bool {
        matches!(self, VarType::Float | VarType::Double)
    }

    pub fn is_simd(self) -> bool {
        matches!(self, VarType::Simd8 | VarType::Simd12 | VarType::Simd16)
    }

    /// Integral scalar, including GC pointers.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            VarType::Bool
                | VarType::Byte
                | VarType::Short
                | VarType::Int
                | VarType::Long
                | VarType::Ref
                | VarType::Byref
        )
    }

    /// Value visible to the garbage collector.
    pub fn is_gc(self) -> bool {
        matches!(self, VarType::Ref | VarType::Byref)
    }

    /// Whether values of this type are held in floating point registers.
    pub fn uses_float_reg(self) -> bool {
        self.is_floating() || self.is_simd()
    }

    /// Size in bytes, or 0 for `Void` and `Struct`.
    pub fn size(self) -> u32 {
        match self {
            VarType::Void | VarType::Struct => 0,
            VarType::Bool | VarType::Byte => 1,
            VarType::Short => 2,
            VarType::Int | VarType::Float => 4,
            VarType::Long
            | VarType::Ref
            | VarType::Byref
            | VarType::Double
            | VarType::Simd8 => 8,
            VarType::Simd12 => 12,
            VarType::Simd16 => 16,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VarType::Void => "void",
            VarType::Bool => "bool",
            VarType::Byte => "byte",
            VarType::Short => "short",
            VarType::Int => "int",
            VarType::Long => "long",
            VarType::Ref => "ref",
            VarType::Byref => "byref",
            VarType::Float => "float",
            VarType::Double => "double",
            VarType::Simd8 => "simd8",
            VarType::Simd12 => "simd12",
            VarType::Simd16 => "simd16",
            VarType::Struct => "struct",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
