//! Per-method build pipeline: verify, then build the reference positions.

use log::{debug, warn};
use lsra_ir::method::Method;
use lsra_regalloc::stream::RefPositionStream;
use lsra_target::backend::{Backend, build_ref_positions};
use lsra_target::error::{BuildError, BuildResult};

use crate::config::PipelineConfig;

/// Build the reference-position stream of one method.
///
/// With `config.verify_ir` set, malformed IR is reported as
/// [`BuildError::Verify`] before any position is built.
pub fn build_method(
    backend: &dyn Backend,
    method: &Method,
    config: &PipelineConfig,
) -> BuildResult<RefPositionStream> {
    if config.verify_ir {
        let result = method.verify();
        if !result.is_ok() {
            warn!("@{}: {result}", method.name);
            return Err(BuildError::Verify(result.to_string()));
        }
    }

    debug!(
        "@{}: building for {} ({} nodes)",
        method.name,
        backend.target().name(),
        method.nodes.len()
    );
    let stream = build_ref_positions(backend, method);
    if let Err(err) = &stream {
        if err.is_capability_gap() {
            debug!("@{}: {err}", method.name);
        } else {
            warn!("@{}: {err}", method.name);
        }
    }
    stream
}
