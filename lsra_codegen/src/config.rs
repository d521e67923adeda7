//! Pipeline configuration.

use std::num::NonZeroUsize;

/// Settings shared by every method built in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Worker threads for [`build_methods`](crate::build_methods).
    pub workers: NonZeroUsize,
    /// Run the structural IR verifier before building each method.
    pub verify_ir: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            verify_ir: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_verify_ir(mut self, verify_ir: bool) -> Self {
        self.verify_ir = verify_ir;
        self
    }
}
