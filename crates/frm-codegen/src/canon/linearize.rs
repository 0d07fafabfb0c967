//! `ESeq` hoisting.
//!
//! Each expression is rewritten to a pair `(statements, pure expression)`:
//! the statements run first and the expression no longer contains any.
//! When a later operand's statements could change an earlier operand's
//! value, the earlier value is saved in a temporary before they run.

use frm_translate::{ARRAY_READ, Exp, Stm};

use super::Canonicalizer;
use crate::error::{CodegenError, Result};

impl Canonicalizer {
    /// Hoist statements out of expressions and flatten the tree.
    ///
    /// # Returns
    ///
    /// A statement list free of `Seq` and `ESeq`, in execution order.
    pub fn linearize(&mut self, stm: &Stm) -> Result<Vec<Stm>> {
        let stm = self.do_stm(stm.clone())?;
        let mut out = Vec::new();
        flatten(stm, &mut out);
        Ok(out)
    }

    fn do_stm(&mut self, stm: Stm) -> Result<Stm> {
        match stm {
            Stm::Seq(stms) => {
                let mut out = Vec::with_capacity(stms.len());
                for s in stms {
                    out.push(self.do_stm(s)?);
                }
                Ok(Stm::Seq(out))
            }
            Stm::Move {
                dest: Exp::Call { func, args, ty },
                src,
            } if func == ARRAY_READ => {
                // The element address is computed before the stored value.
                let count = args.len();
                let mut exps = args;
                exps.push(src);
                let (s, mut exps) = self.reorder(exps)?;
                let src = exps.pop().filter(|_| exps.len() == count).ok_or_else(|| {
                    CodegenError::internal("array store lost an operand")
                })?;
                Ok(seq(
                    s,
                    Stm::Move {
                        dest: Exp::Call {
                            func,
                            args: exps,
                            ty,
                        },
                        src,
                    },
                ))
            }
            Stm::Move { dest, src } => {
                let (s, src) = self.do_exp(src)?;
                Ok(seq(s, Stm::Move { dest, src }))
            }
            Stm::Exp(e) => {
                let (s, e) = self.do_exp(e)?;
                Ok(seq(s, Stm::Exp(e)))
            }
            Stm::CJump {
                op,
                left,
                right,
                t,
                f,
            } => {
                let (s, exps) = self.reorder(vec![left, right])?;
                let [left, right] = exactly(exps)?;
                Ok(seq(
                    s,
                    Stm::CJump {
                        op,
                        left,
                        right,
                        t,
                        f,
                    },
                ))
            }
            jump_or_label => Ok(jump_or_label),
        }
    }

    fn do_exp(&mut self, exp: Exp) -> Result<(Stm, Exp)> {
        match exp {
            Exp::Var { .. } | Exp::Const { .. } => Ok((Stm::nop(), exp)),
            Exp::Binop {
                op,
                left,
                right,
                ty,
            } => {
                let (s, exps) = self.reorder(vec![*left, *right])?;
                let [left, right] = exactly(exps)?;
                Ok((s, Exp::binop(op, left, right, ty)))
            }
            Exp::Unop { op, operand, ty } => {
                let (s, exps) = self.reorder(vec![*operand])?;
                let [operand] = exactly(exps)?;
                Ok((
                    s,
                    Exp::Unop {
                        op,
                        operand: Box::new(operand),
                        ty,
                    },
                ))
            }
            Exp::Cast { expr, ty } => {
                let (s, exps) = self.reorder(vec![*expr])?;
                let [expr] = exactly(exps)?;
                Ok((s, Exp::cast(expr, ty)))
            }
            Exp::Call { func, args, ty } => {
                let (s, args) = self.reorder(args)?;
                Ok((s, Exp::Call { func, args, ty }))
            }
            Exp::ESeq { stm, exp, .. } => {
                let s1 = self.do_stm(*stm)?;
                let (s2, e) = self.do_exp(*exp)?;
                Ok((seq(s1, s2), e))
            }
        }
    }

    /// Linearize a list of operands evaluated left to right.
    fn reorder(&mut self, exps: Vec<Exp>) -> Result<(Stm, Vec<Exp>)> {
        let mut exps = exps.into_iter();
        let Some(head) = exps.next() else {
            return Ok((Stm::nop(), Vec::new()));
        };
        let (s1, e) = self.do_exp(head)?;
        let (s2, mut rest) = self.reorder(exps.collect())?;
        if commute(&s2, &e) {
            rest.insert(0, e);
            Ok((seq(s1, s2), rest))
        } else {
            let temp = self.new_temp(e.ty());
            rest.insert(0, temp.clone());
            Ok((seq(s1, seq(Stm::mov(temp, e), s2)), rest))
        }
    }
}

/// Whether running `stm` cannot change the value of `exp`. Conservative:
/// only an empty statement, a constant, or a whole array (which is never
/// reassigned, only its elements) qualify.
fn commute(stm: &Stm, exp: &Exp) -> bool {
    stm.is_nop() || exp.is_const() || matches!(exp, Exp::Var { ty, .. } if ty.is_array())
}

fn seq(a: Stm, b: Stm) -> Stm {
    match (a.is_nop(), b.is_nop()) {
        (true, _) => b,
        (_, true) => a,
        _ => Stm::Seq(vec![a, b]),
    }
}

fn exactly<const N: usize>(exps: Vec<Exp>) -> Result<[Exp; N]> {
    <[Exp; N]>::try_from(exps).map_err(|got| {
        CodegenError::internal(format!(
            "expected {} operands after reordering, got {}",
            N,
            got.len()
        ))
    })
}

fn flatten(stm: Stm, out: &mut Vec<Stm>) {
    match stm {
        Stm::Seq(stms) => stms.into_iter().for_each(|s| flatten(s, out)),
        Stm::Exp(Exp::Const { .. } | Exp::Var { .. }) => {}
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frm_ast::{BinaryOp, Type, Value};

    fn int(i: i64) -> Exp {
        Exp::constant(Value::Int(i))
    }

    fn var(name: &str) -> Exp {
        Exp::var(name, Type::Int)
    }

    fn add(a: Exp, b: Exp) -> Exp {
        Exp::binop(BinaryOp::Add, a, b, Type::Int)
    }

    #[test]
    fn test_eseq_is_hoisted() {
        // y = 1 + (x = 2, x)
        let stm = Stm::mov(
            var("y"),
            add(int(1), Exp::eseq(Stm::mov(var("x"), int(2)), var("x"))),
        );
        let out = Canonicalizer::new().linearize(&stm).unwrap();
        assert_eq!(
            out,
            vec![
                Stm::mov(var("x"), int(2)),
                Stm::mov(var("y"), add(int(1), var("x"))),
            ]
        );
    }

    #[test]
    fn test_left_operand_saved_before_side_effect() {
        // y = x + (x = 2, x): the left x is read before the assignment
        let stm = Stm::mov(
            var("y"),
            add(var("x"), Exp::eseq(Stm::mov(var("x"), int(2)), var("x"))),
        );
        let out = Canonicalizer::new().linearize(&stm).unwrap();
        assert_eq!(
            out,
            vec![
                Stm::mov(var("t__temp0"), var("x")),
                Stm::mov(var("x"), int(2)),
                Stm::mov(var("y"), add(var("t__temp0"), var("x"))),
            ]
        );
    }

    #[test]
    fn test_array_store_operands_in_order() {
        let array = Exp::var("farr", Type::IntArray);
        let dest = Exp::call(ARRAY_READ, vec![array.clone(), var("i")], Type::Int);
        let stm = Stm::mov(dest, Exp::eseq(Stm::mov(var("i"), int(3)), int(7)));
        let out = Canonicalizer::new().linearize(&stm).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], Stm::mov(var("t__temp0"), var("i")));
        assert_eq!(out[1], Stm::mov(var("i"), int(3)));
    }

    #[test]
    fn test_flatten_drops_empty_statements() {
        let stm = Stm::Seq(vec![
            Stm::nop(),
            Stm::Seq(vec![Stm::Exp(int(1)), Stm::mov(var("x"), int(1))]),
        ]);
        let out = Canonicalizer::new().linearize(&stm).unwrap();
        assert_eq!(out, vec![Stm::mov(var("x"), int(1))]);
    }
}
