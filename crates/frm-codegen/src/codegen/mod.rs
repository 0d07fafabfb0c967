//! Instruction selection.
//!
//! Walks canonical IR and emits scalar [`Insn`]s. Complex, hyper and color
//! values are carried as bundles of scalar operands and every operation on
//! them is spelled out part by part: C has no complex type in this ABI, and
//! the arithmetic has to match the reference rendering bit for bit.
//!
//! # Dispatch
//!
//! - Statements: `Move` into a variable or array element, `Exp`, `Jump`,
//!   `CJump`, `Label` ([`CodeGen::section`])
//! - Expressions: by node kind, then by operand type (`expr` module)
//! - Standard library calls: by name, then by argument type
//!   (`builtins` module)
//!
//! Scalar temporaries are named `t__<n>` and declared by the emitter from
//! [`CodeGen::temps`].

mod builtins;
mod expr;

use frm_ast::Type;
use frm_translate::{ARRAY_READ, Exp, NameKind, Stm, SymbolTable};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, Result};
use crate::insn::{Arg, Insn, ScalarOp};

/// Options that change the generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenOptions {
    /// Run the peephole optimizer.
    pub optimize: bool,
    /// Print every assignment to a formula variable as it happens.
    pub trace: bool,
}

/// C scalar type of one part of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int,
    Double,
}

impl Scalar {
    pub fn of(ty: Type) -> Self {
        match ty {
            Type::Bool | Type::Int => Scalar::Int,
            _ => Scalar::Double,
        }
    }

    pub fn c_type(self) -> &'static str {
        match self {
            Scalar::Int => "int",
            Scalar::Double => "double",
        }
    }

    fn printf_format(self) -> &'static str {
        match self {
            Scalar::Int => "%d",
            Scalar::Double => "%g",
        }
    }
}

#[derive(Debug, Clone)]
struct VarInfo {
    kind: NameKind,
    dims: Vec<usize>,
}

/// Instruction selector for the sections of one C function.
#[derive(Debug)]
pub struct CodeGen {
    options: CodegenOptions,
    vars: IndexMap<String, VarInfo>,
    temps: Vec<(String, Scalar)>,
    extra: IndexMap<String, Type>,
    insns: Vec<Insn>,
}

impl CodeGen {
    pub fn new(symbols: &SymbolTable, options: CodegenOptions) -> Self {
        let vars = symbols
            .variables()
            .map(|v| {
                (
                    v.c_name(),
                    VarInfo {
                        kind: v.name.kind,
                        dims: v.dims.clone(),
                    },
                )
            })
            .collect();
        Self {
            options,
            vars,
            temps: Vec::new(),
            extra: IndexMap::new(),
            insns: Vec::new(),
        }
    }

    /// Scalar temporaries created so far, with their C types.
    pub fn temps(&self) -> &[(String, Scalar)] {
        &self.temps
    }

    /// Variables the IR uses that the symbol table does not know about,
    /// such as the canonicalizer's temporaries.
    pub fn extra_vars(&self) -> &IndexMap<String, Type> {
        &self.extra
    }

    /// Generate code for one canonicalized section.
    ///
    /// # Errors
    ///
    /// IR that canonicalization should have removed (`Seq`, `ESeq`), or a
    /// type combination no standard library overload produces.
    pub fn section(&mut self, stms: &[Stm]) -> Result<Vec<Insn>> {
        for (i, stm) in stms.iter().enumerate() {
            self.stm(stm, stms.get(i + 1))?;
        }
        Ok(std::mem::take(&mut self.insns))
    }

    fn stm(&mut self, stm: &Stm, next: Option<&Stm>) -> Result<()> {
        match stm {
            Stm::Move {
                dest: Exp::Var { name, ty },
                src,
            } => {
                let value = self.exp(src)?;
                let dest = self.var(name, *ty);
                self.assign(&dest, value)?;
                if self.options.trace && self.is_local(name) {
                    self.trace_parts(&dest, *ty)?;
                }
                Ok(())
            }
            Stm::Move {
                dest: Exp::Call { func, args, .. },
                src,
            } if func == ARRAY_READ => {
                let value = self.exp(src)?;
                self.array_write(args, value)
            }
            Stm::Move { dest, .. } => Err(CodegenError::internal(format!(
                "cannot assign to {:?}",
                dest
            ))),
            Stm::Exp(e) => self.exp(e).map(|_| ()),
            Stm::Jump(label) => {
                self.emit(Insn::oper(format!("goto {};", label), vec![], vec![]));
                Ok(())
            }
            Stm::CJump {
                op,
                left,
                right,
                t,
                f,
            } => {
                let operand_ty = left.ty();
                let (l, r) = (self.exp(left)?, self.exp(right)?);
                let test = match ScalarOp::from_binop(*op) {
                    Some(sop) if sop.is_test() && l.is_scalar() && r.is_scalar() => {
                        Insn::oper(
                            format!("if ({{s0}} {} {{s1}}) goto {};", sop, t),
                            vec![],
                            vec![l, r],
                        )
                    }
                    _ => {
                        let cond = self.binop(*op, l, r, operand_ty, Type::Bool)?;
                        Insn::oper(format!("if ({{s0}}) goto {};", t), vec![], vec![cond])
                    }
                };
                self.emit(test);
                if next != Some(&Stm::Label(f.clone())) {
                    self.emit(Insn::oper(format!("goto {};", f), vec![], vec![]));
                }
                Ok(())
            }
            Stm::Label(label) => {
                self.emit(Insn::Label(label.to_string()));
                Ok(())
            }
            Stm::Seq(_) => Err(CodegenError::internal(
                "nested sequence reached code generation",
            )),
        }
    }

    fn emit(&mut self, insn: Insn) {
        self.insns.push(insn);
    }

    /// Move each part of `value` into the matching part of `dest`.
    fn assign(&mut self, dest: &Arg, value: Arg) -> Result<()> {
        let dests = dest.parts();
        let values = value.into_parts();
        if dests.len() != values.len() {
            return Err(CodegenError::internal(format!(
                "assigning {} part(s) to {:?}",
                values.len(),
                dest
            )));
        }
        let moves: Vec<Insn> = dests
            .into_iter()
            .zip(values)
            .map(|(d, v)| Insn::mov(d.clone(), v))
            .collect();
        self.insns.extend(moves);
        Ok(())
    }

    fn trace_parts(&mut self, dest: &Arg, ty: Type) -> Result<()> {
        let scalar = Scalar::of(ty);
        for part in dest.parts() {
            let name = part.format()?;
            self.emit(Insn::Literal(format!(
                "printf(\"{} = {}\\n\", {});",
                name,
                scalar.printf_format(),
                name
            )));
        }
        Ok(())
    }

    fn is_local(&self, c_name: &str) -> bool {
        self.vars
            .get(c_name)
            .is_some_and(|v| v.kind == NameKind::Local)
    }

    /// Operand for a variable, split into its parts.
    fn var(&mut self, name: &str, ty: Type) -> Arg {
        if !self.vars.contains_key(name) && !name.starts_with("t__h_") {
            self.extra.entry(name.to_string()).or_insert(ty);
        }
        var_arg(name, ty)
    }

    fn four_temps(&mut self) -> [Arg; 4] {
        [
            self.scalar_temp(Scalar::Double),
            self.scalar_temp(Scalar::Double),
            self.scalar_temp(Scalar::Double),
            self.scalar_temp(Scalar::Double),
        ]
    }

    fn scalar_temp(&mut self, scalar: Scalar) -> Arg {
        let name = format!("t__{}", self.temps.len());
        self.temps.push((name.clone(), scalar));
        Arg::Temp(name)
    }

    fn array_dims(&self, name: &str) -> Result<Vec<usize>> {
        match self.vars.get(name) {
            Some(info) if !info.dims.is_empty() => Ok(info.dims.clone()),
            _ => Err(CodegenError::internal(format!(
                "'{}' has no array dimensions",
                name
            ))),
        }
    }
}

/// Operand naming each part of a variable: `fz` becomes `fz_re`, `fz_im`.
pub(crate) fn var_arg(name: &str, ty: Type) -> Arg {
    let part = |suffix: &str| Arg::temp(format!("{}{}", name, suffix));
    match ty {
        Type::Complex => Arg::complex(part("_re"), part("_im")),
        Type::Hyper | Type::Color => {
            let p = ty.parts();
            let parts = [part(p[0]), part(p[1]), part(p[2]), part(p[3])];
            if ty == Type::Hyper {
                Arg::hyper(parts)
            } else {
                Arg::color(parts)
            }
        }
        _ => Arg::temp(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frm_ast::{BinaryOp, Value};
    use frm_translate::Label;

    fn gen() -> CodeGen {
        CodeGen::new(&SymbolTable::new(None), CodegenOptions::default())
    }

    fn lines(insns: &[Insn]) -> Vec<String> {
        insns.iter().map(|i| i.format().unwrap()).collect()
    }

    #[test]
    fn test_complex_move_splits_parts() {
        let stm = Stm::mov(
            Exp::var("fz", Type::Complex),
            Exp::constant(Value::Complex(1.0, 3.0)),
        );
        let out = gen().section(&[stm]).unwrap();
        assert_eq!(lines(&out), vec!["fz_re = 1.0;", "fz_im = 3.0;"]);
    }

    #[test]
    fn test_cjump_falls_through_to_false_label() {
        let (t, f) = (Label::new("t"), Label::new("f"));
        let stms = vec![
            Stm::cjump_on(Exp::var("t__tmp0", Type::Bool), t.clone(), f.clone()),
            Stm::Label(f),
            Stm::Label(t),
        ];
        let out = gen().section(&stms).unwrap();
        assert_eq!(lines(&out), vec!["if (t__tmp0 != 0) goto t;", "f: ;", "t: ;"]);
    }

    #[test]
    fn test_cjump_without_fallthrough_jumps_explicitly() {
        let stm = Stm::CJump {
            op: BinaryOp::Lt,
            left: Exp::var("fi", Type::Int),
            right: Exp::constant(Value::Int(3)),
            t: Label::new("a"),
            f: Label::new("b"),
        };
        let out = gen().section(&[stm]).unwrap();
        assert_eq!(lines(&out), vec!["if (fi < 3) goto a;", "goto b;"]);
    }

    #[test]
    fn test_trace_prints_locals_only() {
        let mut symbols = SymbolTable::new(None);
        symbols.local("x", 1).unwrap();
        let mut cg = CodeGen::new(
            &symbols,
            CodegenOptions {
                trace: true,
                ..CodegenOptions::default()
            },
        );
        let stms = vec![
            Stm::mov(
                Exp::var("fx", Type::Complex),
                Exp::constant(Value::Complex(1.0, 3.0)),
            ),
            Stm::mov(Exp::var("t__temp0", Type::Int), Exp::constant(Value::Int(4))),
        ];
        let out = lines(&cg.section(&stms).unwrap());
        assert!(out.contains(&"printf(\"fx_re = %g\\n\", fx_re);".to_string()));
        assert!(out.contains(&"printf(\"fx_im = %g\\n\", fx_im);".to_string()));
        assert_eq!(out.iter().filter(|l| l.starts_with("printf")).count(), 2);
        assert_eq!(cg.extra_vars().get("t__temp0"), Some(&Type::Int));
    }

    #[test]
    fn test_leftover_eseq_is_internal_error() {
        let stm = Stm::Exp(Exp::eseq(Stm::nop(), Exp::constant(Value::Int(1))));
        assert!(gen().section(&[stm]).is_err());
    }
}
