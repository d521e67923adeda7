//! Text format for lowered IR.
//!
//! Output format:
//! ```text
//! method @name {
//!   bb0:
//!     n0 = cns_int 1 : long
//!     n1 = lea [n0 + 16] : byref (contained)
//!     n2 = ind n1 : int
//! }
//! ```

use std::fmt;

use crate::method::Method;
use crate::node::{CallKind, CallTarget, Node, Op};
use crate::value::NodeRef;

fn fmt_list(nodes: &[NodeRef]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_op(op: &Op) -> String {
    let name = op.name();
    match op {
        Op::LclVar(lcl) => format!("{name} {lcl}"),
        Op::LclFld(lcl, offs) | Op::LclAddr(lcl, offs) => format!("{name} {lcl}+{offs}"),
        Op::StoreLclVar(lcl, v) => format!("{name} {lcl}, {v}"),
        Op::StoreLclFld(lcl, offs, v) => format!("{name} {lcl}+{offs}, {v}"),
        Op::CnsInt(v) => format!("{name} {v}"),
        Op::CnsDbl(v) => format!("{name} {v:?}"),
        Op::Intrinsic(which, a) => format!("{name}.{} {a}", which.name()),
        Op::PutArgReg(v, slot) => format!("{name} {v} -> arg{slot}"),
        Op::Lea(am) => {
            let mut parts = Vec::new();
            if let Some(base) = am.base {
                parts.push(base.to_string());
            }
            if let Some(index) = am.index {
                parts.push(format!("{index}*{}", am.scale));
            }
            if am.offset != 0 || parts.is_empty() {
                parts.push(am.offset.to_string());
            }
            format!("{name} [{}]", parts.join(" + "))
        }
        Op::Call(call) => {
            let callee = match call.kind {
                CallKind::User => "user".to_string(),
                CallKind::Helper(h) => format!("helper {h:?}"),
            };
            let target = match call.target {
                CallTarget::Direct => String::new(),
                CallTarget::Indirect(t) => format!(" indirect {t}"),
                CallTarget::Control(t) => format!(" control {t}"),
                CallTarget::IndirectCell => " cell".to_string(),
            };
            let tail = if call.fast_tail_call { " tail" } else { "" };
            format!(
                "{name} {callee}{target}{tail} ({})",
                fmt_list(&call.args)
            )
        }
        Op::StoreBlk(blk) => format!(
            "{name}.{:?}{} {}, {}, {} bytes",
            blk.kind,
            if blk.init { ".init" } else { "" },
            blk.addr,
            blk.data,
            blk.size
        ),
        _ => {
            let operands = op.operands();
            if operands.is_empty() {
                name.to_string()
            } else {
                format!("{name} {}", fmt_list(&operands))
            }
        }
    }
}

fn fmt_flags(node: &Node) -> String {
    let mut flags = Vec::new();
    if node.flags.contained {
        flags.push("contained");
    }
    if node.flags.unused_value {
        flags.push("unused");
    }
    if node.flags.overflow {
        flags.push("ovf");
    }
    if node.flags.multi_reg {
        flags.push("multireg");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method @{} {{", self.name)?;
        for block in self.block_refs() {
            writeln!(f, "  bb{}:", block.index())?;
            for n in self.block_nodes(block) {
                let node = self.node(n);
                writeln!(
                    f,
                    "    {n} = {} : {}{}",
                    fmt_op(&node.op),
                    node.ty,
                    fmt_flags(node)
                )?;
            }
        }
        write!(f, "}}")
    }
}
