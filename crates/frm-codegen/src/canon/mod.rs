//! Canonicalization of tree IR.
//!
//! Three passes turn one section's tree into a straight list of statements
//! code generation can walk top to bottom:
//!
//! 1. [`Canonicalizer::linearize`] hoists every `ESeq` out of expressions,
//!    introducing temporaries where evaluation order would otherwise change,
//!    and flattens `Seq`s.
//! 2. [`Canonicalizer::basic_blocks`] cuts the list into blocks that start
//!    with one label and end with one jump.
//! 3. [`Canonicalizer::schedule_trace`] orders the blocks so every
//!    conditional jump falls through to its false label.
//!
//! One canonicalizer is shared by every section of a compilation unit, so
//! the temporaries and labels it makes up never collide.

mod blocks;
mod linearize;
mod trace;

pub use blocks::Block;

use frm_ast::Type;
use frm_translate::{Exp, Label, Stm};
use std::collections::HashSet;
use tracing::trace;

use crate::error::Result;

/// Fresh-name source for the canonicalization passes.
#[derive(Debug, Default)]
pub struct Canonicalizer {
    temps: usize,
    labels: usize,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all three passes over one section.
    ///
    /// # Returns
    ///
    /// Statements with no `Seq` or `ESeq`, where each `CJump` is followed by
    /// its false label and labels nothing jumps to are dropped.
    pub fn canonicalize(&mut self, stm: &Stm) -> Result<Vec<Stm>> {
        let linear = self.linearize(stm)?;
        let (blocks, done) = self.basic_blocks(linear);
        let block_count = blocks.len();
        let scheduled = self.schedule_trace(blocks, &done);
        let out = prune_labels(scheduled);
        trace!(blocks = block_count, statements = out.len(), "canonicalized section");
        Ok(out)
    }

    fn new_temp(&mut self, ty: Type) -> Exp {
        let temp = Exp::var(format!("t__temp{}", self.temps), ty);
        self.temps += 1;
        temp
    }

    fn new_label(&mut self) -> Label {
        let label = Label::new(format!("t__blk{}", self.labels));
        self.labels += 1;
        label
    }
}

/// Drop labels that no jump targets.
fn prune_labels(stms: Vec<Stm>) -> Vec<Stm> {
    let targets: HashSet<Label> = stms
        .iter()
        .flat_map(|s| match s {
            Stm::Jump(l) => vec![l.clone()],
            Stm::CJump { t, f, .. } => vec![t.clone(), f.clone()],
            _ => Vec::new(),
        })
        .collect();
    stms.into_iter()
        .filter(|s| match s {
            Stm::Label(l) => targets.contains(l),
            _ => true,
        })
        .collect()
}
