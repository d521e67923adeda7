//! lsra_codegen: Method-level driver for the register-requirement builder.
//!
//! Verifies each method's IR, runs the target backend over it and hands
//! back the reference-position stream. Independent methods can be built
//! concurrently with [`build_methods`].

pub mod config;
pub mod parallel;
pub mod pipeline;

pub use config::PipelineConfig;
pub use parallel::build_methods;
pub use pipeline::build_method;
