//! Settings sections: parameter and function declarations, formula
//! metadata, and the compile-time constant evaluator they rely on.

use frm_ast::{BinaryOp, Expr, ExprKind, SetValue, Setting, SettingKind, Type, UnaryOp, Value};
use serde::{Deserialize, Serialize};

use super::Translator;
use crate::error::{ErrorKind, Result, TranslateError};
use crate::symbol::stdlib;

/// Value of a metadata setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Value(Value),
    /// Bare word such as `smooth = no`.
    Ident(String),
    Strings(Vec<String>),
    Func(String),
    List(Vec<Value>),
}

/// What a GUI needs to know about a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub ty: Type,
    pub default: Value,
    pub caption: Option<String>,
    pub hint: Option<String>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub enum_values: Vec<String>,
}

/// A function parameter and the function selected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncInfo {
    pub name: String,
    pub default: String,
    pub selected: String,
    pub caption: Option<String>,
}

fn strings(settings: &[Setting], name: &str) -> Option<String> {
    match Setting::find(settings, name)? {
        SetValue::Strings(s) => Some(s.join("")),
        _ => None,
    }
}

fn constant(settings: &[Setting], name: &str) -> Option<Value> {
    match Setting::find(settings, name)? {
        SetValue::Expr(e) => const_eval(e),
        _ => None,
    }
}

impl Translator<'_> {
    pub(super) fn default_section(&mut self, settings: &[Setting]) {
        for setting in settings {
            let result = match &setting.kind {
                SettingKind::Set { name, value } => self
                    .meta_value(value, setting.pos)
                    .map(|v| self.push_metadata("default", name, v)),
                SettingKind::Param { ty, name, settings } => {
                    self.param_block(*ty, name, settings, setting.pos)
                }
                SettingKind::Func { ty, name, settings } => {
                    self.func_block(*ty, name, settings, setting.pos)
                }
                SettingKind::Heading { settings } => {
                    // Only the declarations inside a heading matter here.
                    let nested: Vec<Setting> = settings
                        .iter()
                        .filter(|s| !matches!(s.kind, SettingKind::Set { .. }))
                        .cloned()
                        .collect();
                    self.default_section(&nested);
                    Ok(())
                }
            };
            if let Err(err) = result {
                self.diagnostics.push(err);
            }
        }
    }

    /// Keep the `name = value` entries of any other settings section, in
    /// order (gradient sections repeat `index` and `color`).
    pub(super) fn record_settings(&mut self, section: &str, settings: &[Setting]) {
        for setting in settings {
            if let SettingKind::Set { name, value } = &setting.kind {
                match self.meta_value(value, setting.pos) {
                    Ok(v) => self.push_metadata(section, name, v),
                    Err(err) => self.diagnostics.push(err),
                }
            }
        }
    }

    fn push_metadata(&mut self, section: &str, name: &str, value: MetaValue) {
        self.metadata
            .entry(section.to_string())
            .or_default()
            .push((name.to_ascii_lowercase(), value));
    }

    fn meta_value(&self, value: &SetValue, line: usize) -> Result<MetaValue> {
        let single = |e: &Expr| match (&e.kind, const_eval(e)) {
            (_, Some(v)) => Ok(MetaValue::Value(v)),
            (ExprKind::Id(word), None) => Ok(MetaValue::Ident(word.clone())),
            (_, None) => Err(TranslateError::new(
                ErrorKind::InvalidSetting,
                line,
                format!("setting value '{}' is not a constant", super::expr::describe(e)),
            )),
        };
        match value {
            SetValue::Expr(e) => single(e),
            SetValue::Strings(s) => Ok(MetaValue::Strings(s.clone())),
            SetValue::FuncRef(f) => Ok(MetaValue::Func(f.to_ascii_lowercase())),
            SetValue::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match single(item)? {
                        MetaValue::Value(v) => values.push(v),
                        _ => {
                            return Err(TranslateError::new(
                                ErrorKind::InvalidSetting,
                                line,
                                "list settings may only contain constants",
                            ));
                        }
                    }
                }
                Ok(MetaValue::List(values))
            }
        }
    }

    fn param_block(
        &mut self,
        ty: Option<Type>,
        name: &str,
        settings: &[Setting],
        line: usize,
    ) -> Result<()> {
        let enum_values = match Setting::find(settings, "enum") {
            Some(SetValue::Strings(values)) => values.clone(),
            _ => Vec::new(),
        };

        let default = match Setting::find(settings, "default") {
            None => None,
            Some(SetValue::Strings(text)) if !enum_values.is_empty() => {
                let wanted = text.join("");
                let index = enum_values
                    .iter()
                    .position(|v| v.eq_ignore_ascii_case(&wanted))
                    .ok_or_else(|| {
                        TranslateError::new(
                            ErrorKind::UnknownEnumValue,
                            line,
                            format!("default \"{}\" is not one of the values of '{}'", wanted, name),
                        )
                    })?;
                Some(Value::Int(index as i64))
            }
            Some(SetValue::Expr(e)) => Some(const_eval(e).ok_or_else(|| {
                TranslateError::new(
                    ErrorKind::InvalidSetting,
                    line,
                    format!("default value of parameter '{}' is not a constant", name),
                )
            })?),
            Some(_) => {
                return Err(TranslateError::new(
                    ErrorKind::InvalidSetting,
                    line,
                    format!("invalid default value for parameter '{}'", name),
                ));
            }
        };

        let ty = ty
            .or_else(|| (!enum_values.is_empty()).then_some(Type::Int))
            .or_else(|| default.as_ref().map(Value::datatype))
            .unwrap_or(Type::Complex);

        let value = match (&default, ty) {
            (_, Type::Gradient | Type::Image) => Value::Int(0),
            (Some(v), _) => v.cast(ty).ok_or_else(|| {
                TranslateError::new(
                    ErrorKind::TypeMismatch,
                    line,
                    format!(
                        "default value {} of parameter '{}' is not a {}",
                        v, name, ty
                    ),
                )
            })?,
            (None, _) => ty.default_value(),
        };

        self.symbols.declare_param(name, ty, value.clone(), line)?;
        if !enum_values.is_empty() {
            self.symbols.set_enum_values(&format!("@{}", name), enum_values.clone());
        }

        self.params.insert(
            name.to_ascii_lowercase(),
            ParamInfo {
                name: name.to_string(),
                ty,
                default: value,
                caption: strings(settings, "caption"),
                hint: strings(settings, "hint"),
                min: constant(settings, "min"),
                max: constant(settings, "max"),
                enum_values,
            },
        );
        Ok(())
    }

    fn func_block(
        &mut self,
        ty: Option<Type>,
        name: &str,
        settings: &[Setting],
        line: usize,
    ) -> Result<()> {
        let default = match Setting::find(settings, "default") {
            Some(SetValue::FuncRef(f)) => f.to_ascii_lowercase(),
            _ => "ident".to_string(),
        };
        let key = name.to_ascii_lowercase();
        let selected = self
            .options
            .func_overrides
            .get(&key)
            .cloned()
            .unwrap_or_else(|| default.clone());
        self.symbols.set_func_param(name, &selected, ty, line)?;
        self.funcs.insert(
            key,
            FuncInfo {
                name: name.to_string(),
                default,
                selected: selected.to_ascii_lowercase(),
                caption: strings(settings, "caption"),
            },
        );
        Ok(())
    }
}

/// Evaluate an expression made only of literals, negation, constructor
/// calls and arithmetic. Returns `None` for anything else.
pub fn const_eval(e: &Expr) -> Option<Value> {
    match &e.kind {
        ExprKind::Const(v) => Some(v.clone()),
        ExprKind::Unop {
            op: UnaryOp::Neg,
            operand,
        } => negate(const_eval(operand)?),
        ExprKind::Unop {
            op: UnaryOp::Not,
            operand,
        } => match const_eval(operand)?.cast(Type::Bool)? {
            Value::Bool(b) => Some(Value::Bool(!b)),
            _ => None,
        },
        ExprKind::Funcall { name, args } => {
            let values = args.iter().map(const_eval).collect::<Option<Vec<_>>>()?;
            construct(&name.to_ascii_lowercase(), &values)
        }
        ExprKind::Binop { op, left, right } => fold(*op, const_eval(left)?, const_eval(right)?),
        _ => None,
    }
}

fn real(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => v.as_f64(),
        _ => None,
    }
}

fn negate(v: Value) -> Option<Value> {
    match v {
        Value::Int(i) => i.checked_neg().map(Value::Int),
        Value::Float(x) => Some(Value::Float(-x)),
        Value::Complex(re, im) => Some(Value::Complex(-re, -im)),
        Value::Hyper(h) => Some(Value::Hyper(h.map(|x| -x))),
        Value::Color(c) => Some(Value::Color(c.map(|x| -x))),
        _ => None,
    }
}

fn construct(name: &str, values: &[Value]) -> Option<Value> {
    match (name, values) {
        ("complex", [re, im]) => Some(Value::Complex(real(re)?, real(im)?)),
        ("hyper", [a, b, c, d]) => Some(Value::Hyper([real(a)?, real(b)?, real(c)?, real(d)?])),
        ("hyper", [ri, jk]) => match (ri.cast(Type::Complex)?, jk.cast(Type::Complex)?) {
            (Value::Complex(a, b), Value::Complex(c, d)) => Some(Value::Hyper([a, b, c, d])),
            _ => None,
        },
        ("rgb", [r, g, b]) => Some(Value::Color([real(r)?, real(g)?, real(b)?, 1.0])),
        ("rgba" | "color", [r, g, b, a]) => {
            Some(Value::Color([real(r)?, real(g)?, real(b)?, real(a)?]))
        }
        ("color", [c @ Value::Color(_)]) => Some(c.clone()),
        ("complex", [v]) => v.cast(Type::Complex),
        ("hyper", [v]) => v.cast(Type::Hyper),
        ("float", [v]) => v.cast(Type::Float),
        ("bool", [v]) => v.cast(Type::Bool),
        ("int", [Value::Float(x)]) => Some(Value::Int(x.trunc() as i64)),
        ("int", [v]) => v.cast(Type::Int),
        _ => None,
    }
}

/// Fold a binary operator over constants using the overload the
/// translator would pick.
fn fold(op: BinaryOp, a: Value, b: Value) -> Option<Value> {
    let func = stdlib().resolve(op.symbol(), &[a.datatype(), b.datatype()])?;
    let a = a.cast(*func.args.first()?)?;
    let b = b.cast(*func.args.get(1)?)?;
    match (op, a, b) {
        (BinaryOp::Add, Value::Int(x), Value::Int(y)) => x.checked_add(y).map(Value::Int),
        (BinaryOp::Sub, Value::Int(x), Value::Int(y)) => x.checked_sub(y).map(Value::Int),
        (BinaryOp::Mul, Value::Int(x), Value::Int(y)) => x.checked_mul(y).map(Value::Int),
        (BinaryOp::Mod, Value::Int(x), Value::Int(y)) => x.checked_rem(y).map(Value::Int),
        (BinaryOp::Add, Value::Float(x), Value::Float(y)) => Some(Value::Float(x + y)),
        (BinaryOp::Sub, Value::Float(x), Value::Float(y)) => Some(Value::Float(x - y)),
        (BinaryOp::Mul, Value::Float(x), Value::Float(y)) => Some(Value::Float(x * y)),
        (BinaryOp::Div, Value::Float(x), Value::Float(y)) if y != 0.0 => Some(Value::Float(x / y)),
        (BinaryOp::Mod, Value::Float(x), Value::Float(y)) if y != 0.0 => Some(Value::Float(x % y)),
        (BinaryOp::Add, Value::Complex(a, b), Value::Complex(c, d)) => {
            Some(Value::Complex(a + c, b + d))
        }
        (BinaryOp::Sub, Value::Complex(a, b), Value::Complex(c, d)) => {
            Some(Value::Complex(a - c, b - d))
        }
        (BinaryOp::Mul, Value::Complex(a, b), Value::Complex(c, d)) => {
            Some(Value::Complex(a * c - b * d, a * d + b * c))
        }
        (BinaryOp::Div, Value::Complex(a, b), Value::Complex(c, d)) => {
            let denom = c * c + d * d;
            (denom != 0.0).then(|| Value::Complex((a * c + b * d) / denom, (b * c - a * d) / denom))
        }
        _ => None,
    }
}
