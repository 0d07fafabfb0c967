//! Expression translation: name lookup, overload resolution, coercion and
//! short-circuit lowering.

use frm_ast::{BinaryOp, Expr, ExprKind, Type, UnaryOp, Value};

use super::defaults::const_eval;
use super::{FormulaKind, Translator};
use crate::error::{ErrorKind, Result, TranslateError};
use crate::ir::{ARRAY_READ, Exp, Stm};
use crate::symbol::{Func, GRADIENT_PARAM, Symbol, TYPE_CONSTRUCTORS, stdlib};

/// Source-like rendering of an expression for error messages.
pub(super) fn describe(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Binop { op, left, right } => {
            format!("{} {} {}", describe(left), op, describe(right))
        }
        ExprKind::Unop { op, operand } => format!("{}{}", op, describe(operand)),
        ExprKind::Funcall { name, args } | ExprKind::ArrayLookup { name, indices: args } => {
            let (open, close) = match e.kind {
                ExprKind::ArrayLookup { .. } => ("[", "]"),
                _ => ("(", ")"),
            };
            let args: Vec<String> = args.iter().map(describe).collect();
            format!("{}{}{}{}", name, open, args.join(","), close)
        }
        ExprKind::Assign { target, value } => {
            format!("{} = {}", describe(target), describe(value))
        }
        ExprKind::Const(v) => v.to_string(),
        ExprKind::String(s) => format!("\"{}\"", s),
        ExprKind::Id(name) => name.clone(),
    }
}

fn type_list(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Translator<'_> {
    pub(super) fn exp(&mut self, e: &Expr) -> Result<Exp> {
        match &e.kind {
            ExprKind::Const(v) => Ok(Exp::constant(v.clone())),
            ExprKind::String(s) => Ok(Exp::constant(Value::String(s.clone()))),
            ExprKind::Id(name) => self.id(name, e.pos),
            ExprKind::Binop { op, left, right } if op.is_logical() => {
                self.short_circuit(*op, left, right)
            }
            ExprKind::Binop { op, left, right } => self.binop(*op, left, right, e.pos),
            ExprKind::Unop { op, operand } => self.unop(*op, operand, e),
            ExprKind::Funcall { name, args } => self.funcall(name, args, e),
            ExprKind::ArrayLookup { name, indices } => self.array_element(name, indices, e.pos),
            ExprKind::Assign { target, value } => {
                let (dest, src) = self.assignment(target, value, e.pos)?;
                Ok(Exp::eseq(Stm::mov(dest.clone(), src), dest))
            }
        }
    }

    fn id(&mut self, name: &str, line: usize) -> Result<Exp> {
        let key = self.symbols.resolve_key(name);
        if let Some(Symbol::FuncParam(_)) = self.symbols.get(&key) {
            return Err(TranslateError::new(
                ErrorKind::NotAValue,
                line,
                format!("'{}' is a function, not a value", name),
            ));
        }
        let var = self.symbols.local(name, line)?;
        Ok(Exp::var(var.c_name(), var.ty))
    }

    /// Translate `target = value`, returning the destination and the
    /// converted source.
    pub(super) fn assignment(&mut self, target: &Expr, value: &Expr, line: usize) -> Result<(Exp, Exp)> {
        match &target.kind {
            ExprKind::Id(name) => {
                let key = self.symbols.resolve_key(name);
                if stdlib().contains(&key) && self.symbols.get(&key).is_none() {
                    return Err(TranslateError::new(
                        ErrorKind::NoOverride,
                        line,
                        format!("'{}' is a predefined function and cannot be redefined", name),
                    ));
                }
                if let Some(Symbol::FuncParam(_)) = self.symbols.get(&key) {
                    return Err(TranslateError::new(
                        ErrorKind::InvalidAssignment,
                        line,
                        format!("cannot assign to function '{}'", name),
                    ));
                }
                let src = self.exp(value)?;
                let var = self.symbols.local(name, line)?;
                if var.ty.is_array() {
                    return Err(TranslateError::new(
                        ErrorKind::ArrayArity,
                        line,
                        format!("cannot assign to array '{}' without an index", name),
                    ));
                }
                let dest = Exp::var(var.c_name(), var.ty);
                let src = self.coerce(src, dest.ty(), value)?;
                Ok((dest, src))
            }
            ExprKind::ArrayLookup { name, indices } => {
                let dest = self.array_element(name, indices, line)?;
                let src = self.exp(value)?;
                let src = self.coerce(src, dest.ty(), value)?;
                Ok((dest, src))
            }
            _ => Err(TranslateError::new(
                ErrorKind::InvalidAssignment,
                line,
                format!("cannot assign to '{}'", describe(target)),
            )),
        }
    }

    fn binop(&mut self, op: BinaryOp, left: &Expr, right: &Expr, line: usize) -> Result<Exp> {
        let (a, b) = match (&left.kind, &right.kind) {
            (_, ExprKind::String(s)) if op.is_comparison() => {
                let b = self.enum_value(left, s, line)?;
                (self.exp(left)?, b)
            }
            (ExprKind::String(s), _) if op.is_comparison() => {
                let a = self.enum_value(right, s, line)?;
                (a, self.exp(right)?)
            }
            _ => (self.exp(left)?, self.exp(right)?),
        };
        let (func, args) = self.resolve(op.symbol(), vec![a, b], line)?;
        let mut args = args.into_iter();
        match (args.next(), args.next()) {
            (Some(l), Some(r)) => Ok(Exp::binop(op, l, r, func.ret)),
            _ => Err(TranslateError::internal(line, format!("operator {} lost an operand", op))),
        }
    }

    /// A string compared with an enum parameter stands for its index.
    fn enum_value(&mut self, param: &Expr, text: &str, line: usize) -> Result<Exp> {
        let ExprKind::Id(name) = &param.kind else {
            return Err(TranslateError::new(
                ErrorKind::TypeMismatch,
                line,
                format!("\"{}\" can only be compared with an enumerated parameter", text),
            ));
        };
        let has_values = self
            .symbols
            .get_var(name)
            .is_some_and(|v| !v.enum_values.is_empty());
        if !has_values {
            return Err(TranslateError::new(
                ErrorKind::TypeMismatch,
                line,
                format!("'{}' is not an enumerated parameter", name),
            ));
        }
        match self.symbols.resolve_enum(name, text) {
            Some(index) => Ok(Exp::constant(Value::Int(index))),
            None => Err(TranslateError::new(
                ErrorKind::UnknownEnumValue,
                line,
                format!("\"{}\" is not one of the values of '{}'", text, name),
            )),
        }
    }

    fn unop(&mut self, op: UnaryOp, operand: &Expr, whole: &Expr) -> Result<Exp> {
        if let Some(value) = const_eval(whole) {
            return Ok(Exp::constant(value));
        }
        match op {
            UnaryOp::Neg => {
                let x = self.exp(operand)?;
                let (func, mut args) = self.resolve(op.symbol(), vec![x], whole.pos)?;
                let x = args.pop().ok_or_else(|| {
                    TranslateError::internal(whole.pos, "negation lost its operand")
                })?;
                Ok(Exp::Unop {
                    op,
                    operand: Box::new(x),
                    ty: func.ret,
                })
            }
            UnaryOp::Not => {
                let x = self.condition(operand)?;
                Ok(Exp::Unop {
                    op,
                    operand: Box::new(x),
                    ty: Type::Bool,
                })
            }
        }
    }

    fn funcall(&mut self, name: &str, args: &[Expr], whole: &Expr) -> Result<Exp> {
        let line = whole.pos;
        let lname = name.to_ascii_lowercase();

        let function = match self.symbols.func_param(&lname) {
            Some(param) => param.function.clone(),
            None if lname.starts_with('@') => {
                return Err(TranslateError::new(
                    ErrorKind::UndefinedName,
                    line,
                    format!("unknown function parameter '{}'", name),
                ));
            }
            None => lname,
        };

        if !stdlib().contains(&function) {
            return Err(TranslateError::new(
                ErrorKind::UndefinedName,
                line,
                format!("unknown function '{}'", name),
            ));
        }
        if TYPE_CONSTRUCTORS.contains(&function.as_str()) || matches!(function.as_str(), "rgb" | "rgba") {
            if let Some(value) = const_eval(whole) {
                return Ok(Exp::constant(value));
            }
        }

        let mut exps = Vec::with_capacity(args.len());
        for arg in args {
            exps.push(self.exp(arg)?);
        }

        if function == "gradient" {
            return self.gradient_call(exps, line);
        }

        match self.resolve(&function, exps.clone(), line) {
            Ok((func, args)) => Ok(call_or_convert(function, &func, args)),
            Err(err) if exps.len() == 2 => {
                // Legacy `fn(a, b)` meaning `fn((a, b))`.
                let retried = self
                    .resolve("complex", exps, line)
                    .map(|(func, args)| Exp::call("complex", args, func.ret))
                    .and_then(|z| self.resolve(&function, vec![z], line));
                match retried {
                    Ok((func, args)) => Ok(Exp::call(function, args, func.ret)),
                    Err(_) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// `gradient(x)` reads the gradient parameter at `x`. Coloring formulas
    /// first map `x` through the transfer function, density and offset.
    fn gradient_call(&mut self, args: Vec<Exp>, line: usize) -> Result<Exp> {
        let (func, mut args) = self.resolve("gradient", args, line)?;
        let x = args
            .pop()
            .ok_or_else(|| TranslateError::internal(line, "gradient lost its argument"))?;
        let x = if self.kind == FormulaKind::ColorFunc {
            self.apply_transfer(x, line)?
        } else {
            x
        };
        let gradient = self.symbols.param(GRADIENT_PARAM, line)?;
        let handle = Exp::var(gradient.c_name(), gradient.ty);
        Ok(Exp::call("gradient", vec![handle, x], func.ret))
    }

    fn array_element(&mut self, name: &str, indices: &[Expr], line: usize) -> Result<Exp> {
        let (c_name, ty, dims) = match self.symbols.get_var(name) {
            Some(var) => (var.c_name(), var.ty, var.dims.len()),
            None => {
                return Err(TranslateError::new(
                    ErrorKind::UndefinedName,
                    line,
                    format!("array '{}' is not declared", name),
                ));
            }
        };
        let Some(element) = ty.element_type() else {
            return Err(TranslateError::new(
                ErrorKind::ArrayArity,
                line,
                format!("'{}' is not an array", name),
            ));
        };
        if dims != indices.len() {
            return Err(TranslateError::new(
                ErrorKind::ArrayArity,
                line,
                format!(
                    "array '{}' has {} dimension(s) but is indexed with {}",
                    name,
                    dims,
                    indices.len()
                ),
            ));
        }
        let mut args = vec![Exp::var(c_name, ty)];
        for index in indices {
            let i = self.exp(index)?;
            args.push(self.coerce(i, Type::Int, index)?);
        }
        Ok(Exp::call(ARRAY_READ, args, element))
    }

    /// `a && b` and `a || b` evaluate `b` only when needed: the result goes
    /// through a temporary assigned on two exclusive paths.
    fn short_circuit(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Exp> {
        let a = self.condition(left)?;
        let b = self.condition(right)?;
        let temp = self.symbols.new_temp(Type::Bool);
        let result = Exp::var(temp.c_name(), Type::Bool);
        let eval_right = self.new_label();
        let done = self.new_label();

        let branch = match op {
            BinaryOp::And => Stm::cjump_on(result.clone(), eval_right.clone(), done.clone()),
            _ => Stm::cjump_on(result.clone(), done.clone(), eval_right.clone()),
        };
        let body = Stm::Seq(vec![
            Stm::mov(result.clone(), a),
            branch,
            Stm::Label(eval_right),
            Stm::mov(result.clone(), b),
            Stm::Jump(done.clone()),
            Stm::Label(done),
        ]);
        Ok(Exp::eseq(body, result))
    }

    /// Translate an expression used as a truth value. Non-boolean operands
    /// are compared against zero.
    pub(super) fn condition(&mut self, e: &Expr) -> Result<Exp> {
        let x = self.exp(e)?;
        match x.ty() {
            Type::Bool => Ok(x),
            ty if Type::can_be_cast(ty, Type::Bool) => Ok(Exp::binop(
                BinaryOp::Ne,
                x,
                Exp::Const {
                    value: ty.default_value(),
                    ty,
                },
                Type::Bool,
            )),
            ty => Err(TranslateError::new(
                ErrorKind::TypeMismatch,
                e.pos,
                format!("invalid type {} for {}, expected bool", ty, describe(e)),
            )),
        }
    }

    /// Resolve an operator or function against the standard library and
    /// convert the arguments to the chosen overload's parameter types.
    pub(super) fn resolve(&mut self, name: &str, args: Vec<Exp>, line: usize) -> Result<(Func, Vec<Exp>)> {
        let types: Vec<Type> = args.iter().map(Exp::ty).collect();
        let Some(func) = stdlib().resolve(name, &types) else {
            return Err(TranslateError::new(
                ErrorKind::NoMatchingOverload,
                line,
                format!("invalid argument types ({}) for '{}'", type_list(&types), name),
            ));
        };
        let args = args
            .into_iter()
            .zip(&func.args)
            .map(|(arg, to)| convert(arg, *to))
            .collect();
        Ok((func.clone(), args))
    }

    /// Convert to the type a context expects, warning about implicit casts.
    pub(super) fn coerce(&mut self, x: Exp, to: Type, source: &Expr) -> Result<Exp> {
        let from = x.ty();
        if from == to {
            return Ok(x);
        }
        if let Exp::Const { value, .. } = &x {
            if let Some(value) = value.cast(to) {
                return Ok(Exp::Const { value, ty: to });
            }
        }
        if Type::can_be_cast(from, to) {
            self.diagnostics.push(TranslateError::warning(
                ErrorKind::ImplicitConversion,
                source.pos,
                format!("conversion from {} to {} for {}", from, to, describe(source)),
            ));
            return Ok(Exp::cast(x, to));
        }
        Err(TranslateError::new(
            ErrorKind::TypeMismatch,
            source.pos,
            format!(
                "invalid type {} for {}, expected {}",
                from,
                describe(source),
                to
            ),
        ))
    }
}

/// `TYPE(x)` is a plain conversion whenever `x` already casts to `TYPE`;
/// the rest (`int(1.5)`, `color(r, g, b, a)`) stay calls.
fn call_or_convert(function: String, func: &Func, mut args: Vec<Exp>) -> Exp {
    let converts = match args.as_slice() {
        [x] => TYPE_CONSTRUCTORS.contains(&function.as_str()) && Type::can_be_cast(x.ty(), func.ret),
        _ => false,
    };
    match args.pop() {
        Some(x) if converts => convert(x, func.ret),
        Some(x) => {
            args.push(x);
            Exp::call(function, args, func.ret)
        }
        None => Exp::call(function, args, func.ret),
    }
}

/// Silent widening of an argument to an overload parameter type.
fn convert(x: Exp, to: Type) -> Exp {
    if x.ty() == to {
        return x;
    }
    if let Exp::Const { value, .. } = &x {
        if let Some(value) = value.cast(to) {
            return Exp::Const { value, ty: to };
        }
    }
    Exp::cast(x, to)
}
