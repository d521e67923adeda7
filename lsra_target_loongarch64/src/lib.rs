//! lsra_target_loongarch64: LoongArch64 register requirements.

pub mod abi;
mod build;
mod call;
mod mem;
pub mod reg;

pub use abi::LoongArch64;
pub use mem::LCLHEAP_UNROLL_LIMIT;
