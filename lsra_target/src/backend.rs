//! Backend trait for target-specific register requirements.

use log::debug;
use lsra_ir::method::Method;
use lsra_ir::value::NodeRef;
use lsra_regalloc::stream::RefPositionStream;

use crate::build::{BuildCtx, NodeBuild};
use crate::descriptor::TargetDescriptor;
use crate::error::BuildResult;

/// Target-specific register-requirement builder.
///
/// Implementations decide, per operator, which uses, defs, kills and
/// internal registers a node needs on their target. A backend is shared
/// by every worker, so it holds no per-method state; all of that lives in
/// the [`BuildCtx`].
pub trait Backend: Sync {
    fn target(&self) -> &dyn TargetDescriptor;

    /// Build the positions of one non-contained node.
    fn build_node(&self, ctx: &mut BuildCtx<'_>, node: NodeRef) -> BuildResult<NodeBuild>;
}

/// Build the reference-position stream of a whole method, visiting every
/// non-contained node in evaluation order.
pub fn build_ref_positions(backend: &dyn Backend, method: &Method) -> BuildResult<RefPositionStream> {
    let mut ctx = BuildCtx::new(method, backend.target());
    for node in method.nodes_in_order() {
        if method.is_contained(node) {
            continue;
        }
        ctx.begin_node(node);
        let built = backend.build_node(&mut ctx, node)?;
        ctx.finish_node(node, built)?;
    }
    let stream = ctx.into_stream();
    debug!(
        "@{}: {} nodes, {} runs, {} intervals, {} positions",
        method.name,
        method.nodes.len(),
        stream.runs.len(),
        stream.intervals.len(),
        stream.positions.len()
    );
    Ok(stream)
}
