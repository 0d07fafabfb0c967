//! Expressions and operators.

use frm_ast::{BinaryOp, Type, UnaryOp, Value};
use frm_translate::{ARRAY_READ, Exp};

use super::{CodeGen, Scalar};
use crate::error::{CodegenError, Result};
use crate::insn::{Arg, Insn, ScalarOp};

impl CodeGen {
    /// Operand holding the value of a pure expression.
    pub(super) fn exp(&mut self, exp: &Exp) -> Result<Arg> {
        match exp {
            Exp::Var { name, ty } => Ok(self.var(name, *ty)),
            Exp::Const { value, ty } => constant(value, *ty),
            Exp::Binop {
                op,
                left,
                right,
                ty,
            } => {
                let operand_ty = left.ty();
                let l = self.exp(left)?;
                let r = self.exp(right)?;
                if *op == BinaryOp::Pow && operand_ty == Type::Complex {
                    if let Exp::Const { value, .. } = right.as_ref() {
                        if value.as_f64() == Some(2.0) && right.ty() == Type::Float {
                            return self.csqr(&l);
                        }
                    }
                }
                self.binop(*op, l, r, operand_ty, *ty)
            }
            Exp::Unop { op, operand, ty } => {
                let x = self.exp(operand)?;
                self.unop(*op, x, *ty)
            }
            Exp::Cast { expr, ty } => {
                let from = expr.ty();
                let x = self.exp(expr)?;
                self.cast(x, from, *ty)
            }
            Exp::Call { func, args, ty } if func == ARRAY_READ => self.array_read(args, *ty),
            Exp::Call { func, args, ty } => {
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    operands.push((self.exp(arg)?, arg.ty()));
                }
                self.call(func, operands, *ty)
            }
            Exp::ESeq { .. } => Err(CodegenError::internal(
                "statement inside an expression reached code generation",
            )),
        }
    }

    /// Binary operator on operands of type `operand_ty`.
    pub(super) fn binop(
        &mut self,
        op: BinaryOp,
        l: Arg,
        r: Arg,
        operand_ty: Type,
        result_ty: Type,
    ) -> Result<Arg> {
        use Type::*;
        match (op, operand_ty) {
            (BinaryOp::Add | BinaryOp::Sub, Complex | Hyper | Color) => {
                let sop = if op == BinaryOp::Add {
                    ScalarOp::Add
                } else {
                    ScalarOp::Sub
                };
                let parts: Vec<Arg> = l
                    .into_parts()
                    .into_iter()
                    .zip(r.into_parts())
                    .map(|(a, b)| self.dbin(sop, a, b))
                    .collect();
                rebuild(parts, result_ty)
            }
            (BinaryOp::Mul, Complex) => self.cmul(&l, &r),
            (BinaryOp::Mul, Hyper) => self.hmul(&l, &r),
            (BinaryOp::Mul | BinaryOp::Div, Color | Hyper) => {
                let sop = if op == BinaryOp::Mul {
                    ScalarOp::Mul
                } else {
                    ScalarOp::Div
                };
                let parts: Vec<Arg> = l
                    .into_parts()
                    .into_iter()
                    .map(|a| self.dbin(sop, a, r.clone()))
                    .collect();
                rebuild(parts, result_ty)
            }
            (BinaryOp::Div, Complex) => self.cdiv(&l, &r),
            (BinaryOp::Mod, Int) => Ok(self.oper1(Scalar::Int, "{d0} = {s0} % {s1};", vec![l, r])),
            (BinaryOp::Mod, Float) => Ok(self.oper1(Scalar::Double, "{d0} = fmod({s0}, {s1});", vec![l, r])),
            (BinaryOp::Pow, Float) => Ok(self.oper1(Scalar::Double, "{d0} = pow({s0}, {s1});", vec![l, r])),
            (BinaryOp::Pow, Complex) if r.is_scalar() => self.cpow_real(&l, r),
            (BinaryOp::Pow, Complex) => {
                let log = self.clog(&l)?;
                let product = self.cmul(&log, &r)?;
                self.cexp(&product)
            }
            (BinaryOp::Eq | BinaryOp::Ne, Complex | Hyper) => {
                let (joiner, test) = if op == BinaryOp::Eq {
                    (" && ", "==")
                } else {
                    (" || ", "!=")
                };
                let n = l.parts().len();
                let template = (0..n)
                    .map(|i| format!("{{s{}}} {} {{s{}}}", i, test, i + n))
                    .collect::<Vec<_>>()
                    .join(joiner);
                let mut srcs = l.into_parts();
                srcs.extend(r.into_parts());
                Ok(self.oper1(Scalar::Int, format!("{{d0}} = {};", template), srcs))
            }
            (_, Complex) if op.is_comparison() => {
                // Ordering compares the real parts.
                let sop = scalar_op(op)?;
                let (a, b) = (first(l)?, first(r)?);
                Ok(self.bin(sop, Scalar::Int, a, b))
            }
            (_, Bool | Int | Float) => {
                let sop = scalar_op(op)?;
                let scalar = if sop.is_test() {
                    Scalar::Int
                } else {
                    Scalar::of(operand_ty)
                };
                Ok(self.bin(sop, scalar, l, r))
            }
            _ => Err(CodegenError::internal(format!(
                "no code for {} on {}",
                op, operand_ty
            ))),
        }
    }

    fn unop(&mut self, op: UnaryOp, x: Arg, ty: Type) -> Result<Arg> {
        match op {
            UnaryOp::Neg => {
                let scalar = Scalar::of(ty);
                let parts: Vec<Arg> = x
                    .into_parts()
                    .into_iter()
                    .map(|p| self.oper1(scalar, "{d0} = -{s0};", vec![p]))
                    .collect();
                rebuild(parts, ty)
            }
            UnaryOp::Not => Ok(self.oper1(Scalar::Int, "{d0} = !{s0};", vec![x])),
        }
    }

    /// Convert between types along the allowed casts.
    pub(super) fn cast(&mut self, x: Arg, from: Type, to: Type) -> Result<Arg> {
        use Type::*;
        if from == to {
            return Ok(x);
        }
        match (from, to) {
            (Int | Float | Complex | Hyper, Bool) => {
                let n = x.parts().len();
                let template = (0..n)
                    .map(|i| format!("{{s{}}} != 0", i))
                    .collect::<Vec<_>>()
                    .join(" || ");
                Ok(self.oper1(Scalar::Int, format!("{{d0}} = {};", template), x.into_parts()))
            }
            (Bool, Int) => Ok(x),
            (Bool | Int, Float) => Ok(self.widen(x)),
            (Bool | Int | Float, Complex) => {
                let re = if from == Float { x } else { self.widen(x) };
                Ok(Arg::complex(re, Arg::Float(0.0)))
            }
            (Bool | Int | Float, Hyper) => {
                let re = if from == Float { x } else { self.widen(x) };
                Ok(Arg::hyper([re, Arg::Float(0.0), Arg::Float(0.0), Arg::Float(0.0)]))
            }
            (Complex, Hyper) => {
                let [re, im] = two(x)?;
                Ok(Arg::hyper([re, im, Arg::Float(0.0), Arg::Float(0.0)]))
            }
            _ => Err(CodegenError::internal(format!(
                "no conversion from {} to {}",
                from, to
            ))),
        }
    }

    /// An int operand as a double.
    fn widen(&mut self, x: Arg) -> Arg {
        match x {
            Arg::Int(i) => Arg::Float(i as f64),
            Arg::Float(_) => x,
            other => {
                let t = self.scalar_temp(Scalar::Double);
                self.emit(Insn::mov(t.clone(), other));
                t
            }
        }
    }

    /// Element read with bounds check; out of range reads give zero.
    fn array_read(&mut self, args: &[Exp], element: Type) -> Result<Arg> {
        let (name, indices) = self.array_operands(args)?;
        let dims = self.array_dims(&name)?;
        let (check, offset) = index_text(&dims, indices.len())?;
        let scalar = Scalar::of(element);
        let parts: Vec<Arg> = element
            .parts()
            .iter()
            .map(|suffix| {
                let template = format!(
                    "{{d0}} = ({}) ? {}{}[{}] : 0;",
                    check, name, suffix, offset
                );
                self.oper1(scalar, template, indices.clone())
            })
            .collect();
        rebuild(parts, element)
    }

    /// Element write; out of range writes are dropped.
    pub(super) fn array_write(&mut self, args: &[Exp], value: Arg) -> Result<()> {
        let (name, indices) = self.array_operands(args)?;
        let dims = self.array_dims(&name)?;
        let (check, offset) = index_text(&dims, indices.len())?;
        let element = args
            .first()
            .and_then(|a| a.ty().element_type())
            .ok_or_else(|| CodegenError::internal("array store without an array"))?;
        let value_slot = indices.len();
        for (suffix, part) in element.parts().iter().zip(value.into_parts()) {
            let mut srcs = indices.clone();
            srcs.push(part);
            self.emit(Insn::oper(
                format!(
                    "if ({}) {}{}[{}] = {{s{}}};",
                    check, name, suffix, offset, value_slot
                ),
                vec![],
                srcs,
            ));
        }
        Ok(())
    }

    fn array_operands(&mut self, args: &[Exp]) -> Result<(String, Vec<Arg>)> {
        let Some((Exp::Var { name, .. }, rest)) = args.split_first() else {
            return Err(CodegenError::internal("array access without an array variable"));
        };
        let mut indices = Vec::with_capacity(rest.len());
        for index in rest {
            indices.push(self.exp(index)?);
        }
        Ok((name.clone(), indices))
    }

    /// Scalar binop into a fresh temp.
    pub(super) fn bin(&mut self, op: ScalarOp, scalar: Scalar, l: Arg, r: Arg) -> Arg {
        let dest = self.scalar_temp(scalar);
        self.emit(Insn::binop(op, dest.clone(), l, r));
        dest
    }

    /// Double binop into a fresh temp.
    pub(super) fn dbin(&mut self, op: ScalarOp, l: Arg, r: Arg) -> Arg {
        self.bin(op, Scalar::Double, l, r)
    }

    /// Single-destination `Oper` into a fresh temp.
    pub(super) fn oper1(&mut self, scalar: Scalar, template: impl Into<String>, srcs: Vec<Arg>) -> Arg {
        let dest = self.scalar_temp(scalar);
        self.emit(Insn::oper(template, vec![dest.clone()], srcs));
        dest
    }
}

/// Operand for a constant, shaped by the type the IR gives it.
pub(super) fn constant(value: &Value, ty: Type) -> Result<Arg> {
    let value = value.cast(ty).unwrap_or_else(|| value.clone());
    Ok(match value {
        Value::Bool(b) => Arg::Int(b as i64),
        Value::Int(i) => Arg::Int(i),
        Value::Float(f) => Arg::Float(f),
        Value::Complex(re, im) => Arg::complex(Arg::Float(re), Arg::Float(im)),
        Value::Hyper(h) => Arg::hyper(h.map(Arg::Float)),
        Value::Color(c) => Arg::color(c.map(Arg::Float)),
        Value::String(s) => {
            return Err(CodegenError::internal(format!(
                "string constant \"{}\" reached code generation",
                s
            )));
        }
    })
}

/// Bundle scalar parts back into a value of `ty`.
pub(super) fn rebuild(parts: Vec<Arg>, ty: Type) -> Result<Arg> {
    let count = parts.len();
    let wrong = || CodegenError::internal(format!("{} part(s) do not make a {}", count, ty));
    match ty {
        Type::Complex => {
            let [re, im] = <[Arg; 2]>::try_from(parts).map_err(|_| wrong())?;
            Ok(Arg::complex(re, im))
        }
        Type::Hyper => Ok(Arg::hyper(<[Arg; 4]>::try_from(parts).map_err(|_| wrong())?)),
        Type::Color => Ok(Arg::color(<[Arg; 4]>::try_from(parts).map_err(|_| wrong())?)),
        _ => {
            let [x] = <[Arg; 1]>::try_from(parts).map_err(|_| wrong())?;
            Ok(x)
        }
    }
}

pub(super) fn two(x: Arg) -> Result<[Arg; 2]> {
    <[Arg; 2]>::try_from(x.into_parts())
        .map_err(|_| CodegenError::internal("expected a complex operand"))
}

pub(super) fn four(x: Arg) -> Result<[Arg; 4]> {
    <[Arg; 4]>::try_from(x.into_parts())
        .map_err(|_| CodegenError::internal("expected a four-part operand"))
}

fn first(x: Arg) -> Result<Arg> {
    x.into_parts()
        .into_iter()
        .next()
        .ok_or_else(|| CodegenError::internal("operand has no parts"))
}

fn scalar_op(op: BinaryOp) -> Result<ScalarOp> {
    ScalarOp::from_binop(op)
        .ok_or_else(|| CodegenError::internal(format!("'{}' has no scalar form", op)))
}

/// Bounds test and row-major offset over `{s0}`..`{sN}` index holes.
fn index_text(dims: &[usize], count: usize) -> Result<(String, String)> {
    if dims.len() != count {
        return Err(CodegenError::internal(format!(
            "{} index(es) for a {}-dimensional array",
            count,
            dims.len()
        )));
    }
    let check = dims
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{{s{i}}} >= 0 && {{s{i}}} < {d}", i = i, d = d))
        .collect::<Vec<_>>()
        .join(" && ");
    let mut offset = String::from("{s0}");
    for (i, d) in dims.iter().enumerate().skip(1) {
        offset = format!("({}) * {} + {{s{}}}", offset, d, i);
    }
    Ok((check, offset))
}
