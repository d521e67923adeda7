//! lsra_ir: Lowered intermediate representation read by the register
//! requirement builder.

pub mod builder;
pub mod classify;
pub mod display;
pub mod method;
pub mod node;
pub mod types;
pub mod value;
pub mod verifier;
