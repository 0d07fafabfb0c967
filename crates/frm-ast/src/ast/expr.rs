//! Expression and statement nodes.

use serde::{Deserialize, Serialize};

use crate::foundation::{BinaryOp, Type, UnaryOp, Value};

/// An expression with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Binop {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unop {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Function call, type constructor (`complex(a,b)`) or a desugared
    /// magnitude (`|z|` is `cmag(z)`) or tuple literal.
    Funcall {
        name: String,
        args: Vec<Expr>,
    },
    ArrayLookup {
        name: String,
        indices: Vec<Expr>,
    },
    /// Assignment is an expression: `a = b = 3` is legal.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Const(Value),
    String(String),
    Id(String),
}

impl Expr {
    pub fn new(kind: ExprKind, pos: usize) -> Self {
        Self { kind, pos }
    }

    pub fn id(name: impl Into<String>, pos: usize) -> Self {
        Self::new(ExprKind::Id(name.into()), pos)
    }

    pub fn constant(value: Value, pos: usize) -> Self {
        Self::new(ExprKind::Const(value), pos)
    }

    pub fn funcall(name: impl Into<String>, args: Vec<Expr>, pos: usize) -> Self {
        Self::new(
            ExprKind::Funcall {
                name: name.into(),
                args,
            },
            pos,
        )
    }

    pub fn binop(op: BinaryOp, left: Expr, right: Expr, pos: usize) -> Self {
        Self::new(
            ExprKind::Binop {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            pos,
        )
    }

    /// Constant value, if this is a literal.
    pub fn as_const(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Const(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(&self.kind, ExprKind::Binop { op, .. } if op.is_comparison())
    }
}

/// A statement with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Decl {
        ty: Type,
        name: String,
        init: Option<Expr>,
    },
    DeclArray {
        ty: Type,
        name: String,
        dims: Vec<Expr>,
    },
    /// `elseif` chains are nested `If`s in `otherwise`.
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: usize) -> Self {
        Self { kind, pos }
    }
}
