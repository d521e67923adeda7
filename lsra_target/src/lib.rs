//! lsra_target: Target abstraction for the LSRA register-requirement
//! builder.
//!
//! Defines the target descriptor every backend implements, the shared
//! per-method build context with the policies that are the same on every
//! target, and the error kinds of a build.

pub mod backend;
pub mod build;
pub mod descriptor;
pub mod error;
pub mod options;

#[cfg(test)]
mod tests;
