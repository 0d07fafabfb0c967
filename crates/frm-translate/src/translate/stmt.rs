//! Statement translation and the control-flow shapes the canonicalizer
//! expects.

use frm_ast::{Expr, ExprKind, Stmt, StmtKind, Type, Value};

use super::defaults::const_eval;
use super::expr::describe;
use super::{BAILOUT_VAR, Translator};
use crate::error::{ErrorKind, Result, TranslateError};
use crate::ir::{Exp, Stm};
use crate::symbol::stdlib;

/// Types a local variable may be declared with.
const DECLARABLE: &[Type] = &[
    Type::Bool,
    Type::Int,
    Type::Float,
    Type::Complex,
    Type::Color,
    Type::Hyper,
];

impl Translator<'_> {
    /// Translate a statement list, recording and skipping statements that
    /// fail.
    pub(super) fn stmt_list(&mut self, stmts: &[Stmt]) -> Vec<Stm> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match self.stmt(stmt) {
                Ok(ir) => out.push(ir),
                Err(err) => self.diagnostics.push(err),
            }
        }
        out
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Stm> {
        match &stmt.kind {
            StmtKind::Expr(e) => self.expr_stmt(e),
            StmtKind::Decl { ty, name, init } => self.decl(*ty, name, init.as_ref(), stmt.pos),
            StmtKind::DeclArray { ty, name, dims } => self.decl_array(*ty, name, dims, stmt.pos),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let test = self.branch_condition(cond);
                let t = self.new_label();
                let f = self.new_label();
                let done = self.new_label();
                let then = self.stmt_list(then);
                let otherwise = self.stmt_list(otherwise);
                Ok(Stm::Seq(vec![
                    Stm::cjump_on(test, t.clone(), f.clone()),
                    Stm::Label(t),
                    Stm::Seq(then),
                    Stm::Jump(done.clone()),
                    Stm::Label(f),
                    Stm::Seq(otherwise),
                    Stm::Label(done),
                ]))
            }
            StmtKind::While { cond, body } => {
                let start = self.new_label();
                let inner = self.new_label();
                let done = self.new_label();
                let test = self.branch_condition(cond);
                let body = self.stmt_list(body);
                Ok(Stm::Seq(vec![
                    Stm::Label(start.clone()),
                    Stm::cjump_on(test, inner.clone(), done.clone()),
                    Stm::Label(inner),
                    Stm::Seq(body),
                    Stm::Jump(start),
                    Stm::Label(done),
                ]))
            }
            StmtKind::Repeat { body, until } => {
                let start = self.new_label();
                let done = self.new_label();
                let body = self.stmt_list(body);
                let test = self.branch_condition(until);
                Ok(Stm::Seq(vec![
                    Stm::Label(start.clone()),
                    Stm::Seq(body),
                    Stm::cjump_on(test, done.clone(), start),
                    Stm::Label(done),
                ]))
            }
        }
    }

    /// A condition that fails to translate is recorded and stands in as
    /// `false`, so the statements it guards are still checked.
    fn branch_condition(&mut self, cond: &Expr) -> Exp {
        self.condition(cond).unwrap_or_else(|err| {
            self.diagnostics.push(err);
            Exp::constant(Value::Bool(false))
        })
    }

    fn expr_stmt(&mut self, e: &Expr) -> Result<Stm> {
        match &e.kind {
            ExprKind::Assign { target, value } => {
                let (dest, src) = self.assignment(target, value, e.pos)?;
                Ok(Stm::mov(dest, src))
            }
            _ => Ok(Stm::Exp(self.exp(e)?)),
        }
    }

    fn decl(&mut self, ty: Type, name: &str, init: Option<&Expr>, line: usize) -> Result<Stm> {
        if stdlib().contains(name) {
            return Err(TranslateError::new(
                ErrorKind::NoOverride,
                line,
                format!("'{}' is a predefined function and cannot be redefined", name),
            ));
        }
        if !DECLARABLE.contains(&ty) {
            return Err(TranslateError::new(
                ErrorKind::TypeMismatch,
                line,
                format!("cannot declare a {} variable", ty),
            ));
        }
        let value = match init {
            Some(e) => {
                let x = self.exp(e)?;
                self.coerce(x, ty, e)?
            }
            None => Exp::Const {
                value: ty.default_value(),
                ty,
            },
        };
        let var = self.symbols.declare_local(name, ty, Vec::new(), line)?;
        Ok(Stm::mov(Exp::var(var.c_name(), ty), value))
    }

    fn decl_array(&mut self, ty: Type, name: &str, dims: &[Expr], line: usize) -> Result<Stm> {
        let Some(array_ty) = ty.array_of() else {
            return Err(TranslateError::new(
                ErrorKind::TypeMismatch,
                line,
                format!("cannot declare an array of {}", ty),
            ));
        };
        let mut sizes = Vec::with_capacity(dims.len());
        for dim in dims {
            match const_eval(dim) {
                Some(Value::Int(n)) if n > 0 => sizes.push(n as usize),
                _ => {
                    return Err(TranslateError::new(
                        ErrorKind::ArrayArity,
                        dim.pos,
                        format!(
                            "array dimension '{}' of '{}' must be a positive integer constant",
                            describe(dim),
                            name
                        ),
                    ));
                }
            }
        }
        self.symbols.declare_local(name, array_ty, sizes, line)?;
        Ok(Stm::nop())
    }

    /// The bailout section's last statement decides whether iteration
    /// continues; anything before it runs first.
    pub(super) fn bailout_section(&mut self, stmts: &[Stmt], pos: usize) -> Stm {
        let Some((last, rest)) = stmts.split_last() else {
            self.diagnostics.push(TranslateError::warning(
                ErrorKind::MissingBailout,
                pos,
                "No bailout condition specified",
            ));
            return Stm::nop();
        };
        let mut out = self.stmt_list(rest);
        let test = match &last.kind {
            StmtKind::Expr(e) => self.condition(e),
            _ => Err(TranslateError::new(
                ErrorKind::TypeMismatch,
                last.pos,
                "bailout must end with an expression",
            )),
        };
        match test {
            Ok(test) => out.push(Stm::mov(Exp::var(BAILOUT_VAR, Type::Bool), test)),
            Err(err) => self.diagnostics.push(err),
        }
        Stm::Seq(out)
    }
}
