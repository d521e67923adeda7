//! Concurrent building of independent methods.
//!
//! Each worker pulls the next unclaimed method and builds it with its own
//! context. The backend is shared read-only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::debug;
use lsra_ir::method::Method;
use lsra_regalloc::stream::RefPositionStream;
use lsra_target::backend::Backend;
use lsra_target::error::BuildResult;

use crate::config::PipelineConfig;
use crate::pipeline::build_method;

/// Build every method, returning one result per method in input order.
///
/// A failing method does not stop the others.
pub fn build_methods(
    backend: &dyn Backend,
    methods: &[Method],
    config: &PipelineConfig,
) -> Vec<BuildResult<RefPositionStream>> {
    let workers = config.workers.get().min(methods.len());
    if workers <= 1 {
        return methods
            .iter()
            .map(|method| build_method(backend, method, config))
            .collect();
    }
    debug!("building {} methods on {workers} workers", methods.len());

    let next = AtomicUsize::new(0);
    let mut results: Vec<Option<BuildResult<RefPositionStream>>> =
        (0..methods.len()).map(|_| None).collect();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut built = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(method) = methods.get(idx) else {
                            break;
                        };
                        built.push((idx, build_method(backend, method, config)));
                    }
                    built
                })
            })
            .collect();
        for handle in handles {
            let built = handle
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
            for (idx, result) in built {
                results[idx] = Some(result);
            }
        }
    });

    // Every index below `methods.len()` is claimed by exactly one worker.
    results.into_iter().flatten().collect()
}
