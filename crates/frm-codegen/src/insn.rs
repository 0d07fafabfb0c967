//! Flat instructions and their operands.
//!
//! Code generation turns canonical IR into a list of [`Insn`]s, each of which
//! formats to one line of C. Operands are [`Arg`]s: scalar constants, named
//! scalars, or bundles of scalars for the multi-part types. Only scalar
//! operands ever reach an instruction; the bundles exist so expression
//! translation can pass a complex value around as one thing.

use std::fmt;

use frm_ast::BinaryOp;

use crate::error::{CodegenError, Result};

/// Instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    /// A named scalar: a variable part (`fz_re`) or a temporary (`t__3`).
    Temp(String),
    Complex(Box<Arg>, Box<Arg>),
    Hyper(Box<[Arg; 4]>),
    Color(Box<[Arg; 4]>),
}

impl Arg {
    pub fn temp(name: impl Into<String>) -> Self {
        Arg::Temp(name.into())
    }

    pub fn complex(re: Arg, im: Arg) -> Self {
        Arg::Complex(Box::new(re), Box::new(im))
    }

    pub fn hyper(parts: [Arg; 4]) -> Self {
        Arg::Hyper(Box::new(parts))
    }

    pub fn color(parts: [Arg; 4]) -> Self {
        Arg::Color(Box::new(parts))
    }

    /// Scalar components, in part order. A scalar is its own only part.
    pub fn parts(&self) -> Vec<&Arg> {
        match self {
            Arg::Complex(re, im) => vec![re, im],
            Arg::Hyper(parts) | Arg::Color(parts) => parts.iter().collect(),
            scalar => vec![scalar],
        }
    }

    pub fn into_parts(self) -> Vec<Arg> {
        match self {
            Arg::Complex(re, im) => vec![*re, *im],
            Arg::Hyper(parts) | Arg::Color(parts) => {
                let [a, b, c, d] = *parts;
                vec![a, b, c, d]
            }
            scalar => vec![scalar],
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Arg::Int(_) | Arg::Float(_) | Arg::Temp(_))
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Arg::Int(_) | Arg::Float(_))
    }

    /// Numeric value of a scalar constant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Int(i) => Some(*i as f64),
            Arg::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// C spelling of a scalar operand.
    ///
    /// # Errors
    ///
    /// A multi-part operand has no single C spelling.
    pub fn format(&self) -> Result<String> {
        match self {
            Arg::Int(i) if *i < 0 => Ok(format!("({})", i)),
            Arg::Int(i) => Ok(i.to_string()),
            Arg::Float(f) => Ok(format_float(*f)),
            Arg::Temp(name) => Ok(name.clone()),
            other => Err(CodegenError::internal(format!(
                "multi-part operand {:?} used as a scalar",
                other
            ))),
        }
    }
}

/// C literal for a double. Always has a decimal point or exponent so C
/// never reads it as an int.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "(0.0/0.0)".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "(1.0/0.0)" } else { "(-1.0/0.0)" };
        text.to_string()
    } else if f.is_sign_negative() && f != 0.0 {
        format!("({:?})", f)
    } else {
        format!("{:?}", f.abs())
    }
}

/// Operators C applies directly to scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl ScalarOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ScalarOp::Add => "+",
            ScalarOp::Sub => "-",
            ScalarOp::Mul => "*",
            ScalarOp::Div => "/",
            ScalarOp::Lt => "<",
            ScalarOp::Le => "<=",
            ScalarOp::Gt => ">",
            ScalarOp::Ge => ">=",
            ScalarOp::Eq => "==",
            ScalarOp::Ne => "!=",
            ScalarOp::And => "&&",
            ScalarOp::Or => "||",
        }
    }

    /// The scalar form of a formula operator; `%` and `^` have none.
    pub fn from_binop(op: BinaryOp) -> Option<Self> {
        Some(match op {
            BinaryOp::Add => ScalarOp::Add,
            BinaryOp::Sub => ScalarOp::Sub,
            BinaryOp::Mul => ScalarOp::Mul,
            BinaryOp::Div => ScalarOp::Div,
            BinaryOp::Lt => ScalarOp::Lt,
            BinaryOp::Le => ScalarOp::Le,
            BinaryOp::Gt => ScalarOp::Gt,
            BinaryOp::Ge => ScalarOp::Ge,
            BinaryOp::Eq => ScalarOp::Eq,
            BinaryOp::Ne => ScalarOp::Ne,
            BinaryOp::And => ScalarOp::And,
            BinaryOp::Or => ScalarOp::Or,
            BinaryOp::Mod | BinaryOp::Pow => return None,
        })
    }

    /// Result is an int truth value rather than a number.
    pub fn is_test(self) -> bool {
        !matches!(
            self,
            ScalarOp::Add | ScalarOp::Sub | ScalarOp::Mul | ScalarOp::Div
        )
    }

    /// Evaluate on two constants the way C would.
    ///
    /// Integer operations that would overflow or divide by zero are left
    /// for the C compiler.
    pub fn fold(self, left: &Arg, right: &Arg) -> Option<Arg> {
        if let (Arg::Int(a), Arg::Int(b)) = (left, right) {
            let (a, b) = (*a, *b);
            return Some(Arg::Int(match self {
                ScalarOp::Add => a.checked_add(b)?,
                ScalarOp::Sub => a.checked_sub(b)?,
                ScalarOp::Mul => a.checked_mul(b)?,
                ScalarOp::Div => a.checked_div(b)?,
                test => test.compare(a as f64, b as f64) as i64,
            }));
        }
        let (a, b) = (left.as_f64()?, right.as_f64()?);
        Some(match self {
            ScalarOp::Add => Arg::Float(a + b),
            ScalarOp::Sub => Arg::Float(a - b),
            ScalarOp::Mul => Arg::Float(a * b),
            ScalarOp::Div => Arg::Float(a / b),
            test => Arg::Int(test.compare(a, b) as i64),
        })
    }

    fn compare(self, a: f64, b: f64) -> bool {
        match self {
            ScalarOp::Lt => a < b,
            ScalarOp::Le => a <= b,
            ScalarOp::Gt => a > b,
            ScalarOp::Ge => a >= b,
            ScalarOp::Eq => a == b,
            ScalarOp::Ne => a != b,
            ScalarOp::And => a != 0.0 && b != 0.0,
            ScalarOp::Or => a != 0.0 || b != 0.0,
            ScalarOp::Add | ScalarOp::Sub | ScalarOp::Mul | ScalarOp::Div => false,
        }
    }
}

impl fmt::Display for ScalarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One line of generated C.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// `dest = src;`
    Move { dest: Arg, src: Arg },
    /// `dest = left op right;`
    Binop {
        op: ScalarOp,
        dest: Arg,
        left: Arg,
        right: Arg,
    },
    /// Free-form C with operand holes: `{d0}`, `{d1}`, ... for
    /// destinations and `{s0}`, `{s1}`, ... for sources. Every hole must
    /// have an operand and every operand a hole.
    Oper {
        template: String,
        dests: Vec<Arg>,
        srcs: Vec<Arg>,
    },
    Label(String),
    /// C text emitted as is.
    Literal(String),
}

impl Insn {
    pub fn mov(dest: Arg, src: Arg) -> Self {
        Insn::Move { dest, src }
    }

    pub fn binop(op: ScalarOp, dest: Arg, left: Arg, right: Arg) -> Self {
        Insn::Binop {
            op,
            dest,
            left,
            right,
        }
    }

    pub fn oper(template: impl Into<String>, dests: Vec<Arg>, srcs: Vec<Arg>) -> Self {
        Insn::Oper {
            template: template.into(),
            dests,
            srcs,
        }
    }

    /// Destination operands this instruction writes.
    pub fn dests(&self) -> &[Arg] {
        match self {
            Insn::Move { dest, .. } | Insn::Binop { dest, .. } => std::slice::from_ref(dest),
            Insn::Oper { dests, .. } => dests,
            Insn::Label(_) | Insn::Literal(_) => &[],
        }
    }

    /// Format as a line of C (without indentation).
    ///
    /// # Errors
    ///
    /// Template holes that do not match the operands, multi-part operands,
    /// or a constant destination.
    pub fn format(&self) -> Result<String> {
        match self {
            Insn::Move { dest, src } => {
                Ok(format!("{} = {};", lvalue(dest)?, src.format()?))
            }
            Insn::Binop {
                op,
                dest,
                left,
                right,
            } => Ok(format!(
                "{} = {} {} {};",
                lvalue(dest)?,
                left.format()?,
                op,
                right.format()?
            )),
            Insn::Oper {
                template,
                dests,
                srcs,
            } => fill_template(template, dests, srcs),
            Insn::Label(name) => Ok(format!("{}: ;", name)),
            Insn::Literal(text) => Ok(text.clone()),
        }
    }
}

fn lvalue(arg: &Arg) -> Result<String> {
    match arg {
        Arg::Temp(name) => Ok(name.clone()),
        other => Err(CodegenError::internal(format!(
            "cannot assign to {:?}",
            other
        ))),
    }
}

fn fill_template(template: &str, dests: &[Arg], srcs: &[Arg]) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut used_dests = vec![false; dests.len()];
    let mut used_srcs = vec![false; srcs.len()];
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match parse_hole(after) {
            Some((kind, index, len)) => {
                let (operands, used, what) = match kind {
                    'd' => (dests, &mut used_dests, "destination"),
                    _ => (srcs, &mut used_srcs, "source"),
                };
                let operand = operands.get(index).ok_or_else(|| {
                    CodegenError::template(template, format!("no {} operand {}", what, index))
                })?;
                used[index] = true;
                let text = match kind {
                    'd' => lvalue(operand)?,
                    _ => operand.format()?,
                };
                out.push_str(&text);
                rest = &after[len..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if let Some(i) = used_dests.iter().position(|u| !u) {
        return Err(CodegenError::template(
            template,
            format!("destination operand {} has no hole", i),
        ));
    }
    if let Some(i) = used_srcs.iter().position(|u| !u) {
        return Err(CodegenError::template(
            template,
            format!("source operand {} has no hole", i),
        ));
    }
    Ok(out)
}

/// Recognise `d3}` or `s0}` right after a `{`: returns the hole kind, its
/// index and how many bytes it spans after the brace.
fn parse_hole(text: &str) -> Option<(char, usize, usize)> {
    let kind = text.chars().next().filter(|c| *c == 'd' || *c == 's')?;
    let digits = text[1..].chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || !text[1 + digits..].starts_with('}') {
        return None;
    }
    let index = text[1..1 + digits].parse().ok()?;
    Some((kind, index, digits + 2))
}
