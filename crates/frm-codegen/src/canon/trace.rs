//! Trace scheduling.

use frm_ast::BinaryOp;
use frm_translate::{Label, Stm};
use indexmap::IndexMap;

use super::{Block, Canonicalizer};

impl Canonicalizer {
    /// Order basic blocks so each `CJump` is followed by its false label.
    ///
    /// Traces start at the first unscheduled block in program order and
    /// follow jumps while the target is still unscheduled, preferring a
    /// conditional's false branch. When only the true branch is free the
    /// condition is inverted; when neither is, a fresh false label jumping
    /// to the real one is inserted. Blocks no trace reaches are still
    /// emitted, in their original order. The exit label comes last and jumps
    /// to the label right after them are removed.
    pub fn schedule_trace(&mut self, blocks: Vec<Block>, done: &Label) -> Vec<Stm> {
        let mut order = Vec::with_capacity(blocks.len());
        let mut table: IndexMap<Label, Block> = IndexMap::with_capacity(blocks.len());
        for block in blocks {
            if let Some(label) = block.label().cloned() {
                order.push(label.clone());
                table.insert(label, block);
            }
        }

        let mut out = Vec::new();
        for start in order {
            let mut next = Some(start);
            while let Some(label) = next.take() {
                // Removing a block from the table marks it scheduled.
                let Some(mut block) = table.shift_remove(&label) else {
                    break;
                };
                let last = block.stms.pop();
                out.append(&mut block.stms);
                match last {
                    Some(Stm::Jump(target)) => {
                        if table.contains_key(&target) {
                            next = Some(target.clone());
                        }
                        out.push(Stm::Jump(target));
                    }
                    Some(Stm::CJump {
                        op,
                        left,
                        right,
                        t,
                        f,
                    }) => {
                        let inverted = negate(op).filter(|_| table.contains_key(&t));
                        if table.contains_key(&f) {
                            next = Some(f.clone());
                            out.push(Stm::CJump {
                                op,
                                left,
                                right,
                                t,
                                f,
                            });
                        } else if let Some(op) = inverted {
                            next = Some(t.clone());
                            out.push(Stm::CJump {
                                op,
                                left,
                                right,
                                t: f,
                                f: t,
                            });
                        } else {
                            let fresh = self.new_label();
                            out.push(Stm::CJump {
                                op,
                                left,
                                right,
                                t,
                                f: fresh.clone(),
                            });
                            out.push(Stm::Label(fresh));
                            out.push(Stm::Jump(f));
                        }
                    }
                    Some(other) => out.push(other),
                    None => {}
                }
            }
        }
        out.push(Stm::Label(done.clone()));

        remove_jumps_to_next(out)
    }
}

/// The comparison that holds exactly when `op` does not.
fn negate(op: BinaryOp) -> Option<BinaryOp> {
    Some(match op {
        BinaryOp::Eq => BinaryOp::Ne,
        BinaryOp::Ne => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Ge => BinaryOp::Lt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Le => BinaryOp::Gt,
        _ => return None,
    })
}

fn remove_jumps_to_next(stms: Vec<Stm>) -> Vec<Stm> {
    let mut out: Vec<Stm> = Vec::with_capacity(stms.len());
    for stm in stms {
        let redundant = matches!(
            (&stm, out.last()),
            (Stm::Label(label), Some(Stm::Jump(target))) if label == target
        );
        if redundant {
            out.pop();
        }
        out.push(stm);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use frm_ast::{Type, Value};
    use frm_translate::Exp;

    fn cjump(t: &Label, f: &Label) -> Stm {
        Stm::cjump_on(Exp::var("c", Type::Bool), t.clone(), f.clone())
    }

    fn body(name: &str) -> Stm {
        Stm::mov(Exp::var(name, Type::Int), Exp::constant(Value::Int(1)))
    }

    fn block(stms: Vec<Stm>) -> Block {
        Block { stms }
    }

    #[test]
    fn test_false_branch_follows() {
        let (a, t, f, done) = (
            Label::new("a"),
            Label::new("t"),
            Label::new("f"),
            Label::new("done"),
        );
        let blocks = vec![
            block(vec![Stm::Label(a), cjump(&t, &f)]),
            block(vec![Stm::Label(t.clone()), body("x"), Stm::Jump(done.clone())]),
            block(vec![Stm::Label(f.clone()), body("y"), Stm::Jump(done.clone())]),
        ];
        let out = Canonicalizer::new().schedule_trace(blocks, &done);
        assert_eq!(out[2], Stm::Label(f));
        // the false block falls straight into the exit label
        let tail: Vec<&Stm> = out.iter().rev().take(2).collect();
        assert_eq!(tail[0], &Stm::Label(done));
        assert_ne!(tail[1], &Stm::Jump(Label::new("done")));
    }

    #[test]
    fn test_condition_inverted_when_only_true_branch_free() {
        let (a, b, t, done) = (
            Label::new("a"),
            Label::new("b"),
            Label::new("t"),
            Label::new("done"),
        );
        let blocks = vec![
            block(vec![Stm::Label(a.clone()), body("x"), Stm::Jump(b.clone())]),
            block(vec![Stm::Label(b.clone()), cjump(&t, &a)]),
            block(vec![Stm::Label(t.clone()), body("y"), Stm::Jump(done.clone())]),
        ];
        let out = Canonicalizer::new().schedule_trace(blocks, &done);
        let pos = out
            .iter()
            .position(|s| matches!(s, Stm::CJump { .. }))
            .unwrap();
        match &out[pos] {
            Stm::CJump { op, t: target, f, .. } => {
                assert_eq!(*op, BinaryOp::Eq);
                assert_eq!(target, &a);
                assert_eq!(f, &t);
            }
            _ => unreachable!(),
        }
        assert_eq!(out[pos + 1], Stm::Label(t));
    }

    #[test]
    fn test_fresh_false_label_when_neither_branch_free() {
        let (a, done) = (Label::new("a"), Label::new("done"));
        let other = Label::new("elsewhere");
        let blocks = vec![block(vec![Stm::Label(a.clone()), cjump(&a, &other)])];
        let out = Canonicalizer::new().schedule_trace(blocks, &done);
        match (&out[1], &out[2], &out[3]) {
            (Stm::CJump { f, .. }, Stm::Label(fresh), Stm::Jump(target)) => {
                assert_eq!(f, fresh);
                assert_eq!(target, &other);
            }
            shape => panic!("unexpected {:?}", shape),
        }
    }

    #[test]
    fn test_unreached_blocks_are_kept() {
        let (a, dead, done) = (Label::new("a"), Label::new("dead"), Label::new("done"));
        let blocks = vec![
            block(vec![Stm::Label(a), Stm::Jump(done.clone())]),
            block(vec![Stm::Label(dead.clone()), body("x"), Stm::Jump(done.clone())]),
        ];
        let out = Canonicalizer::new().schedule_trace(blocks, &done);
        assert!(out.contains(&Stm::Label(dead)));
        assert!(out.contains(&body("x")));
    }
}
