//! Reference-position stream: the builder's output for one method.
//!
//! Positions are appended in build order. Each built node owns one
//! contiguous [`NodeRun`] of positions, laid out as its uses, then its
//! internal defs, then its kills and finally its defs. Contained nodes
//! own no run.

use std::fmt;

use lsra_ir::value::{LclNum, NodeRef};

use crate::{KillSet, RegClass, RegMask};

/// Index of an interval in a [`RefPositionStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalId(pub u32);

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// What an interval models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalKind {
    /// The value of a register-candidate local; spans the whole method.
    Local(LclNum),
    /// A node result.
    Temp(NodeRef),
    /// A node result that is a constant and can be rematerialized.
    Constant(NodeRef),
    /// A scratch register private to one node.
    Internal(NodeRef),
}

/// A lifetime of one value competing for one register of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub class: RegClass,
    pub kind: IntervalKind,
    /// Registers the value may ever live in; empty means unrestricted.
    pub candidates: RegMask,
}

impl Interval {
    pub fn is_constant(&self) -> bool {
        matches!(self.kind, IntervalKind::Constant(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self.kind, IntervalKind::Internal(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, IntervalKind::Local(_))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IntervalKind::Local(lcl) => write!(f, "{} local {lcl}", self.class)?,
            IntervalKind::Temp(n) => write!(f, "{} temp {n}", self.class)?,
            IntervalKind::Constant(n) => write!(f, "{} const {n}", self.class)?,
            IntervalKind::Internal(n) => write!(f, "{} internal {n}", self.class)?,
        }
        if !self.candidates.is_empty() {
            write!(f, " {}", self.candidates)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// The node reads the interval.
    Use,
    /// The node writes the interval.
    Def,
    /// A node-private scratch register, live only within the node.
    InternalDef,
    /// The node destroys registers; carries no interval.
    Kill(KillSet),
}

/// One register requirement at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPosition {
    pub node: NodeRef,
    pub kind: RefKind,
    pub interval: Option<IntervalId>,
    /// Candidate registers; empty means any register of the class.
    pub candidates: RegMask,
    /// The register must stay unavailable to the node's destination
    /// until the node completes (used for registers read after the
    /// destination is written).
    pub delay_free: bool,
    /// Which register of a multi-register value this position refers to.
    pub multi_reg_idx: u8,
    /// A def whose value nobody reads: defined and immediately dead.
    pub local_def_use: bool,
}

impl RefPosition {
    pub fn is_use(&self) -> bool {
        self.kind == RefKind::Use
    }

    pub fn is_def(&self) -> bool {
        self.kind == RefKind::Def
    }

    pub fn is_internal(&self) -> bool {
        self.kind == RefKind::InternalDef
    }

    pub fn kill_set(&self) -> Option<KillSet> {
        match self.kind {
            RefKind::Kill(kills) => Some(kills),
            _ => None,
        }
    }
}

impl fmt::Display for RefPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.interval) {
            (RefKind::Kill(kills), _) => return write!(f, "kill {kills}"),
            (RefKind::Use, Some(i)) => write!(f, "use {i}")?,
            (RefKind::Def, Some(i)) => write!(f, "def {i}")?,
            (RefKind::InternalDef, Some(i)) => write!(f, "internal {i}")?,
            (kind, None) => write!(f, "{kind:?} <none>")?,
        }
        if self.multi_reg_idx != 0 {
            write!(f, ".{}", self.multi_reg_idx)?;
        }
        if !self.candidates.is_empty() {
            write!(f, " {}", self.candidates)?;
        }
        if self.delay_free {
            f.write_str(" delay-free")?;
        }
        if self.local_def_use {
            f.write_str(" unused")?;
        }
        Ok(())
    }
}

/// The positions built for one node, with its operand and result counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRun {
    pub node: NodeRef,
    pub start: u32,
    pub len: u32,
    /// Register operands read by the node.
    pub src_count: u32,
    /// Registers defined by the node.
    pub dst_count: u32,
}

/// Ordered reference positions of one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefPositionStream {
    pub intervals: Vec<Interval>,
    pub positions: Vec<RefPosition>,
    pub runs: Vec<NodeRun>,
}

impl RefPositionStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_interval(&mut self, class: RegClass, kind: IntervalKind) -> IntervalId {
        let id = IntervalId(self.intervals.len() as u32);
        self.intervals.push(Interval {
            class,
            kind,
            candidates: RegMask::EMPTY,
        });
        id
    }

    pub fn interval(&self, id: IntervalId) -> &Interval {
        &self.intervals[id.0 as usize]
    }

    pub fn interval_mut(&mut self, id: IntervalId) -> &mut Interval {
        &mut self.intervals[id.0 as usize]
    }

    pub fn push(&mut self, pos: RefPosition) {
        self.positions.push(pos);
    }

    /// Index the next position will take.
    pub fn next_index(&self) -> u32 {
        self.positions.len() as u32
    }

    /// Record that positions `start..` belong to `node`.
    pub fn close_run(&mut self, node: NodeRef, start: u32, src_count: u32, dst_count: u32) {
        self.runs.push(NodeRun {
            node,
            start,
            len: self.next_index() - start,
            src_count,
            dst_count,
        });
    }

    pub fn run_of(&self, node: NodeRef) -> Option<&NodeRun> {
        self.runs.iter().find(|r| r.node == node)
    }

    /// Positions built for `node`; empty if the node was not built.
    pub fn node_positions(&self, node: NodeRef) -> &[RefPosition] {
        match self.run_of(node) {
            Some(run) => &self.positions[run.start as usize..(run.start + run.len) as usize],
            None => &[],
        }
    }

    /// All positions referring to `interval`, in build order.
    pub fn positions_of(&self, interval: IntervalId) -> impl Iterator<Item = &RefPosition> {
        self.positions
            .iter()
            .filter(move |p| p.interval == Some(interval))
    }

    /// The interval defined by `node` (its first def), if any.
    pub fn def_interval(&self, node: NodeRef) -> Option<IntervalId> {
        self.node_positions(node)
            .iter()
            .find(|p| p.is_def())
            .and_then(|p| p.interval)
    }
}

impl fmt::Display for RefPositionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "intervals:")?;
        for (i, interval) in self.intervals.iter().enumerate() {
            writeln!(f, "  i{i}: {interval}")?;
        }
        for run in &self.runs {
            writeln!(
                f,
                "{}: src={} dst={}",
                run.node, run.src_count, run.dst_count
            )?;
            for pos in &self.positions[run.start as usize..(run.start + run.len) as usize] {
                writeln!(f, "  {pos}")?;
            }
        }
        Ok(())
    }
}
