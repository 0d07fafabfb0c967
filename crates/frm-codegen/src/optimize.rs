//! Peephole optimizer.
//!
//! Rewrites single [`Insn::Binop`]s: constant folding and the identities
//! `1 * n` and `0 * n` in either operand order. Everything else, including
//! `n + 0`, is left to the C compiler.

use tracing::debug;

use crate::insn::{Arg, Insn, ScalarOp};

/// Apply the peephole rules to every instruction.
pub fn peephole(insns: Vec<Insn>) -> Vec<Insn> {
    let before = insns.len();
    let mut rewritten = 0usize;
    let out: Vec<Insn> = insns
        .into_iter()
        .map(|insn| match simplify(&insn) {
            Some(better) => {
                rewritten += 1;
                better
            }
            None => insn,
        })
        .collect();
    debug!(instructions = before, rewritten, "peephole pass");
    out
}

fn simplify(insn: &Insn) -> Option<Insn> {
    let Insn::Binop {
        op,
        dest,
        left,
        right,
    } = insn
    else {
        return None;
    };
    if let Some(value) = op.fold(left, right) {
        return Some(Insn::mov(dest.clone(), value));
    }
    let is = |arg: &Arg, k: f64| arg.as_f64() == Some(k);
    let src = match op {
        ScalarOp::Mul if is(left, 1.0) => right.clone(),
        ScalarOp::Mul if is(right, 1.0) => left.clone(),
        ScalarOp::Mul if is(left, 0.0) => left.clone(),
        ScalarOp::Mul if is(right, 0.0) => right.clone(),
        _ => return None,
    };
    Some(Insn::mov(dest.clone(), src))
}
