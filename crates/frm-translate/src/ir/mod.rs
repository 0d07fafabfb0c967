//! Tree intermediate representation.
//!
//! The translator produces one [`Stm`] tree per formula section. Expressions
//! carry their result type; statements are untyped. The shape follows the
//! classic tree IR: `ESeq` lets statements appear inside expressions until the
//! canonicalizer hoists them out, and control flow is expressed with labels,
//! unconditional jumps and two-way conditional jumps.
//!
//! Array stores are a [`Stm::Move`] whose destination is an
//! [`ARRAY_READ`] call: the call names the element being written.

use std::fmt;

use frm_ast::{BinaryOp, Type, UnaryOp, Value};
use serde::{Deserialize, Serialize};

/// Name of the call that reads (or, as a move destination, writes) an array
/// element. Its arguments are the array variable followed by the indices.
pub const ARRAY_READ: &str = "t__read_array";

/// Jump target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(pub String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed IR expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Exp {
    /// Variable reference by its C-level name.
    Var { name: String, ty: Type },
    Const { value: Value, ty: Type },
    Binop {
        op: BinaryOp,
        left: Box<Exp>,
        right: Box<Exp>,
        ty: Type,
    },
    Unop {
        op: UnaryOp,
        operand: Box<Exp>,
        ty: Type,
    },
    /// Call of a standard library function by its base name. Arguments are
    /// already converted to the chosen overload's parameter types.
    Call { func: String, args: Vec<Exp>, ty: Type },
    Cast { expr: Box<Exp>, ty: Type },
    /// Run `stm`, then evaluate `exp`.
    ESeq {
        stm: Box<Stm>,
        exp: Box<Exp>,
        ty: Type,
    },
}

impl Exp {
    pub fn var(name: impl Into<String>, ty: Type) -> Self {
        Exp::Var {
            name: name.into(),
            ty,
        }
    }

    pub fn constant(value: Value) -> Self {
        let ty = value.datatype();
        Exp::Const { value, ty }
    }

    pub fn binop(op: BinaryOp, left: Exp, right: Exp, ty: Type) -> Self {
        Exp::Binop {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Exp>, ty: Type) -> Self {
        Exp::Call {
            func: func.into(),
            args,
            ty,
        }
    }

    pub fn cast(expr: Exp, ty: Type) -> Self {
        Exp::Cast {
            expr: Box::new(expr),
            ty,
        }
    }

    pub fn eseq(stm: Stm, exp: Exp) -> Self {
        let ty = exp.ty();
        Exp::ESeq {
            stm: Box::new(stm),
            exp: Box::new(exp),
            ty,
        }
    }

    /// Result type of the expression.
    pub fn ty(&self) -> Type {
        match self {
            Exp::Var { ty, .. }
            | Exp::Const { ty, .. }
            | Exp::Binop { ty, .. }
            | Exp::Unop { ty, .. }
            | Exp::Call { ty, .. }
            | Exp::Cast { ty, .. }
            | Exp::ESeq { ty, .. } => *ty,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Exp::Const { .. })
    }

    /// Whether an `ESeq` appears anywhere in this expression.
    pub fn contains_eseq(&self) -> bool {
        match self {
            Exp::ESeq { .. } => true,
            Exp::Var { .. } | Exp::Const { .. } => false,
            Exp::Binop { left, right, .. } => left.contains_eseq() || right.contains_eseq(),
            Exp::Unop { operand, .. } => operand.contains_eseq(),
            Exp::Cast { expr, .. } => expr.contains_eseq(),
            Exp::Call { args, .. } => args.iter().any(Exp::contains_eseq),
        }
    }
}

/// IR statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stm {
    /// Assign `src` to `dest`, a [`Exp::Var`] or an [`ARRAY_READ`] call.
    Move { dest: Exp, src: Exp },
    Seq(Vec<Stm>),
    /// Jump to `t` when `left op right` holds, otherwise to `f`.
    CJump {
        op: BinaryOp,
        left: Exp,
        right: Exp,
        t: Label,
        f: Label,
    },
    Jump(Label),
    Label(Label),
    /// Evaluate for side effects only.
    Exp(Exp),
}

impl Stm {
    pub fn mov(dest: Exp, src: Exp) -> Self {
        Stm::Move { dest, src }
    }

    /// Empty statement.
    pub fn nop() -> Self {
        Stm::Seq(Vec::new())
    }

    /// Conditional jump on a boolean expression being true.
    pub fn cjump_on(cond: Exp, t: Label, f: Label) -> Self {
        Stm::CJump {
            op: BinaryOp::Ne,
            left: cond,
            right: Exp::constant(Value::Bool(false)),
            t,
            f,
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Stm::Jump(_) | Stm::CJump { .. })
    }

    /// Whether this statement does nothing.
    pub fn is_nop(&self) -> bool {
        match self {
            Stm::Seq(stms) => stms.iter().all(Stm::is_nop),
            Stm::Exp(Exp::Const { .. }) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Var { name, .. } => write!(f, "{}", name),
            Exp::Const { value, .. } => write!(f, "{}", value),
            Exp::Binop {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op, right),
            Exp::Unop { op, operand, .. } => write!(f, "{}{}", op, operand),
            Exp::Call { func, args, .. } => {
                write!(f, "{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Exp::Cast { expr, ty } => write!(f, "{}({})", ty, expr),
            Exp::ESeq { stm, exp, .. } => write!(f, "eseq({{ {} }}, {})", stm, exp),
        }
    }
}

impl fmt::Display for Stm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stm::Move { dest, src } => write!(f, "{} = {}", dest, src),
            Stm::Seq(stms) => {
                for (i, stm) in stms.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", stm)?;
                }
                Ok(())
            }
            Stm::CJump {
                op,
                left,
                right,
                t,
                f: fl,
            } => write!(f, "cjump {} {} {} ? {} : {}", left, op, right, t, fl),
            Stm::Jump(l) => write!(f, "jump {}", l),
            Stm::Label(l) => write!(f, "{}:", l),
            Stm::Exp(e) => write!(f, "{}", e),
        }
    }
}
