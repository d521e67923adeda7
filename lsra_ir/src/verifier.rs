//! IR verifier: structural integrity checks on lowered IR.
//!
//! Collects all errors rather than stopping at the first one. The
//! verifier checks the shape the register-requirement builder relies on
//! (block layout, operand references, evaluation order, containment);
//! per-operator register policy violations are reported by the builder.
//! Entry point: `Method::verify()`.

use std::fmt;

use crate::method::Method;
use crate::node::Op;
use crate::value::{LclNum, NodeRef};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Location context for a verification error.
#[derive(Debug, Clone)]
pub enum Location {
    Method(String),
    Block(String, u32),
    Node(String, u32),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Method(name) => write!(f, "method @{name}"),
            Location::Block(name, bi) => write!(f, "method @{name}, bb{bi}"),
            Location::Node(name, ni) => write!(f, "method @{name}, n{ni}"),
        }
    }
}

/// A single verification error.
#[derive(Debug, Clone)]
pub struct VerifyError {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.location, self.message)
    }
}

/// Collected verification results.
#[derive(Debug, Default)]
pub struct VerifyResult {
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, location: Location, message: impl Into<String>) {
        self.errors.push(VerifyError {
            location,
            message: message.into(),
        });
    }
}

impl fmt::Display for VerifyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "verification passed");
        }
        writeln!(
            f,
            "verification failed with {} error(s):",
            self.errors.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  {e}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-method verification context
// ---------------------------------------------------------------------------

struct MethodVerifier<'a> {
    method: &'a Method,
    result: &'a mut VerifyResult,
    /// Number of consumers seen per node.
    consumers: Vec<u32>,
}

impl<'a> MethodVerifier<'a> {
    fn new(method: &'a Method, result: &'a mut VerifyResult) -> Self {
        Self {
            method,
            result,
            consumers: vec![0; method.nodes.len()],
        }
    }

    fn method_loc(&self) -> Location {
        Location::Method(self.method.name.clone())
    }

    fn block_loc(&self, bi: u32) -> Location {
        Location::Block(self.method.name.clone(), bi)
    }

    fn node_loc(&self, n: NodeRef) -> Location {
        Location::Node(self.method.name.clone(), n.index())
    }

    fn check_local(&mut self, lcl: LclNum, loc: &Location) {
        if lcl.index() as usize >= self.method.locals.len() {
            self.result
                .error(loc.clone(), format!("dangling local reference {lcl}"));
        }
    }

    /// Operands must exist and be evaluated before their consumer.
    fn check_operand(&mut self, user: NodeRef, operand: NodeRef) {
        let loc = self.node_loc(user);
        if operand.index() as usize >= self.method.nodes.len() {
            self.result
                .error(loc, format!("dangling node reference {operand}"));
            return;
        }
        if operand >= user {
            self.result.error(
                loc,
                format!("operand {operand} is not evaluated before its user"),
            );
            return;
        }
        self.consumers[operand.index() as usize] += 1;
    }

    fn verify_blocks(&mut self) {
        let mut expected_start = 0u32;
        for block in self.method.block_refs() {
            let bb = self.method.block(block);
            if bb.node_start != expected_start {
                self.result.error(
                    self.block_loc(block.index()),
                    format!(
                        "block starts at n{}, expected n{expected_start}",
                        bb.node_start
                    ),
                );
            }
            expected_start = bb.node_start + bb.node_count;
        }
        if expected_start as usize != self.method.nodes.len() {
            self.result.error(
                self.method_loc(),
                format!(
                    "blocks cover {expected_start} nodes, arena holds {}",
                    self.method.nodes.len()
                ),
            );
        }
    }

    fn verify_locals(&mut self) {
        for (i, local) in self.method.locals.iter().enumerate() {
            for &field in &local.fields {
                if field.index() as usize >= self.method.locals.len() || field.index() as usize == i {
                    self.result.error(
                        self.method_loc(),
                        format!("local V{i:02} has invalid field {field}"),
                    );
                }
            }
        }
    }

    fn verify_node(&mut self, n: NodeRef) {
        let node = self.method.node(n);
        let loc = self.node_loc(n);
        match &node.op {
            Op::LclVar(lcl)
            | Op::LclFld(lcl, _)
            | Op::LclAddr(lcl, _)
            | Op::StoreLclVar(lcl, _)
            | Op::StoreLclFld(lcl, _, _) => self.check_local(*lcl, &loc),
            Op::Call(call) => {
                if let Some(desc) = &call.multi_reg_return
                    && desc.regs.len() < 2
                {
                    self.result.error(
                        loc.clone(),
                        "multi-register return with fewer than two registers",
                    );
                }
                if call.fast_tail_call && call.multi_reg_return.is_some() {
                    self.result
                        .error(loc.clone(), "fast tail call cannot define a result");
                }
            }
            _ => {}
        }
        for operand in node.op.operands() {
            self.check_operand(n, operand);
        }
    }

    /// A contained node is folded into exactly one consumer.
    fn verify_containment(&mut self) {
        for n in self.method.nodes_in_order() {
            if !self.method.is_contained(n) {
                continue;
            }
            let uses = self.consumers[n.index() as usize];
            if uses != 1 {
                self.result.error(
                    self.node_loc(n),
                    format!("contained node has {uses} consumers, expected 1"),
                );
            }
        }
    }

    fn verify_all(&mut self) {
        self.verify_blocks();
        if !self.result.is_ok() {
            // Node walks depend on a sane block layout.
            return;
        }
        self.verify_locals();
        for n in self.method.nodes_in_order() {
            self.verify_node(n);
        }
        self.verify_containment();
    }
}

impl Method {
    /// Verify the structural invariants the builder relies on.
    pub fn verify(&self) -> VerifyResult {
        let mut result = VerifyResult::default();
        MethodVerifier::new(self, &mut result).verify_all();
        result
    }
}
