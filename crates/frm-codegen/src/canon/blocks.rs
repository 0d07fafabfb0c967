//! Basic blocks.

use frm_translate::{Label, Stm};

use super::Canonicalizer;

/// A label, straight-line statements, then one `Jump` or `CJump`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stms: Vec<Stm>,
}

impl Block {
    pub fn label(&self) -> Option<&Label> {
        match self.stms.first() {
            Some(Stm::Label(l)) => Some(l),
            _ => None,
        }
    }

    pub fn terminator(&self) -> Option<&Stm> {
        self.stms.last().filter(|s| s.is_jump())
    }

    /// Starts with its only label, ends with its only jump.
    pub fn is_well_formed(&self) -> bool {
        let n = self.stms.len();
        if n < 2 || self.label().is_none() || self.terminator().is_none() {
            return false;
        }
        self.stms[1..n - 1]
            .iter()
            .all(|s| !s.is_jump() && !matches!(s, Stm::Label(_)))
    }
}

impl Canonicalizer {
    /// Partition linearized statements into basic blocks.
    ///
    /// A block missing a label gets a fresh one; a block that would fall
    /// through gets a jump to the next block's label, or to the returned
    /// exit label for the last one.
    pub fn basic_blocks(&mut self, stms: Vec<Stm>) -> (Vec<Block>, Label) {
        let done = self.new_label();
        let mut blocks = Vec::new();
        let mut current: Option<Vec<Stm>> = None;

        for stm in stms {
            match stm {
                Stm::Label(label) => {
                    if let Some(mut open) = current.take() {
                        open.push(Stm::Jump(label.clone()));
                        blocks.push(Block { stms: open });
                    }
                    current = Some(vec![Stm::Label(label)]);
                }
                jump if jump.is_jump() => {
                    let mut open = match current.take() {
                        Some(open) => open,
                        None => vec![Stm::Label(self.new_label())],
                    };
                    open.push(jump);
                    blocks.push(Block { stms: open });
                }
                other => {
                    if current.is_none() {
                        current = Some(vec![Stm::Label(self.new_label())]);
                    }
                    if let Some(open) = current.as_mut() {
                        open.push(other);
                    }
                }
            }
        }
        if let Some(mut open) = current {
            open.push(Stm::Jump(done.clone()));
            blocks.push(Block { stms: open });
        }

        (blocks, done)
    }
}
