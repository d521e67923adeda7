//! Target facts that are not fixed by the instruction set.

/// Process-wide target configuration, fixed before any method is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOptions {
    /// OS page size; larger stack allocations must be probed.
    pub page_size: u32,
    /// GC-interruptible calls also invalidate every register holding a
    /// GC reference.
    pub gc_interruptible_kills_refs: bool,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            page_size: 0x1000,
            gc_interruptible_kills_refs: true,
        }
    }
}

impl TargetOptions {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_gc_interruptible_kills_refs(mut self, enabled: bool) -> Self {
        self.gc_interruptible_kills_refs = enabled;
        self
    }
}
