//! Compile-time constant values.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Type;

/// A constant known at compile time: literals, parameter defaults and folded
/// expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Hyper([f64; 4]),
    Color([f64; 4]),
    String(String),
}

impl Value {
    /// The natural type of this value.
    pub fn datatype(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Complex(..) => Type::Complex,
            Value::Hyper(_) => Type::Hyper,
            Value::Color(_) => Type::Color,
            Value::String(_) => Type::String,
        }
    }

    /// Real component, for values that have one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Complex(re, _) => Some(*re),
            Value::Hyper(h) | Value::Color(h) => Some(h[0]),
            Value::String(_) => None,
        }
    }

    /// Convert to another type following the cast rules.
    ///
    /// Returns `None` when [`Type::can_be_cast`] forbids the conversion.
    /// Gradient and image handles are represented by `Int(0)`.
    pub fn cast(&self, to: Type) -> Option<Value> {
        let from = self.datatype();
        if !Type::can_be_cast(from, to) {
            return None;
        }
        let v = match (self, to) {
            (v, t) if v.datatype() == t => v.clone(),
            (Value::Hyper(h), Type::Bool) => {
                Value::Bool(h.iter().any(|x| *x != 0.0))
            }
            (Value::Complex(re, im), Type::Bool) => Value::Bool(*re != 0.0 || *im != 0.0),
            (v, Type::Bool) => Value::Bool(v.as_f64()? != 0.0),
            (Value::Bool(b), Type::Int) => Value::Int(*b as i64),
            (v, Type::Float) => Value::Float(v.as_f64()?),
            (v, Type::Complex) => Value::Complex(v.as_f64()?, 0.0),
            (Value::Complex(re, im), Type::Hyper) => Value::Hyper([*re, *im, 0.0, 0.0]),
            (v, Type::Hyper) => Value::Hyper([v.as_f64()?, 0.0, 0.0, 0.0]),
            _ => return None,
        };
        Some(v)
    }

    /// Flatten into one scalar value per parameter slot.
    ///
    /// Strings occupy no slots; everything else occupies `datatype().slots()`
    /// entries.
    pub fn to_slots(&self) -> Vec<Value> {
        match self {
            Value::Complex(re, im) => vec![Value::Float(*re), Value::Float(*im)],
            Value::Hyper(h) | Value::Color(h) => h.iter().map(|x| Value::Float(*x)).collect(),
            Value::String(_) => Vec::new(),
            Value::Bool(b) => vec![Value::Int(*b as i64)],
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Complex(re, im) => write!(f, "({},{})", re, im),
            Value::Hyper(h) | Value::Color(h) => {
                write!(f, "({},{},{},{})", h[0], h[1], h[2], h[3])
            }
            Value::String(s) => write!(f, "\"{}\"", s),
        }
    }
}
