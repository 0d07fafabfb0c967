//! The formula type system.
//!
//! Nine scalar-ish types plus the array types. Each type knows how many
//! parameter slots it occupies, how it is spelled in generated C, what its
//! default value is, and which named parts it decomposes into.
//!
//! # Casting
//!
//! [`Type::can_be_cast`] is the single source of truth for implicit
//! conversions. It is directional: `Int -> Float` is allowed, the reverse is
//! not, and `VoidArray` converts to any array type but nothing converts back
//! to `VoidArray`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Value;

/// Formula data type.
///
/// # Layout
///
/// The discriminants of the first nine variants index the rows and columns of
/// `CAST_MATRIX`. Do not reorder them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Type {
    Bool = 0,
    Int = 1,
    Float = 2,
    Complex = 3,
    Color = 4,
    String = 5,
    Hyper = 6,
    Gradient = 7,
    Image = 8,
    VoidArray = 9,
    BoolArray = 10,
    IntArray = 11,
    FloatArray = 12,
    ComplexArray = 13,
    ColorArray = 14,
    HyperArray = 15,
}

/// All nine non-array types, in discriminant order.
pub const SCALAR_TYPES: [Type; 9] = [
    Type::Bool,
    Type::Int,
    Type::Float,
    Type::Complex,
    Type::Color,
    Type::String,
    Type::Hyper,
    Type::Gradient,
    Type::Image,
];

// rows are "from", columns are "to":
//  Bool   Int    Float  Complex Color  String Hyper  Grad   Image
const CAST_MATRIX: [[bool; 9]; 9] = [
    [true, true, true, true, false, false, true, false, false], // Bool
    [true, true, true, true, false, false, true, false, false], // Int
    [true, false, true, true, false, false, true, false, false], // Float
    [true, false, false, true, false, false, true, false, false], // Complex
    [false, false, false, false, true, false, false, false, false], // Color
    [false, false, false, false, false, true, false, false, false], // String
    [true, false, false, false, false, false, true, false, false], // Hyper
    [false, false, false, false, false, false, false, true, false], // Gradient
    [false, false, false, false, false, false, false, false, true], // Image
];

const COMPLEX_PARTS: &[&str] = &["_re", "_im"];
const HYPER_PARTS: &[&str] = &["_re", "_i", "_j", "_k"];

impl Type {
    /// Whether a value of type `from` may be implicitly converted to `to`.
    pub fn can_be_cast(from: Type, to: Type) -> bool {
        if from == to {
            return true;
        }
        match (from.is_array(), to.is_array()) {
            (false, false) => CAST_MATRIX[from as usize][to as usize],
            (true, true) => from == Type::VoidArray && to != Type::VoidArray,
            _ => false,
        }
    }

    /// Number of contiguous parameter slots a parameter of this type uses.
    pub fn slots(self) -> usize {
        match self {
            Type::Bool | Type::Int | Type::Float => 1,
            Type::Complex => 2,
            Type::Color | Type::Hyper => 4,
            Type::String => 0,
            Type::Gradient | Type::Image => 1,
            _ => 1,
        }
    }

    /// C type used for one scalar part of a variable of this type.
    pub fn c_type(self) -> &'static str {
        match self {
            Type::Bool | Type::Int => "int",
            Type::Float | Type::Complex | Type::Color | Type::Hyper => "double",
            Type::String => "const char *",
            _ => "void *",
        }
    }

    /// Suffixes of the scalar parts a variable of this type decomposes into.
    ///
    /// Single-part types return `[""]` so callers can iterate uniformly.
    pub fn parts(self) -> &'static [&'static str] {
        match self {
            Type::Complex => COMPLEX_PARTS,
            Type::Hyper | Type::Color => HYPER_PARTS,
            _ => &[""],
        }
    }

    /// The value a variable of this type holds before its first assignment.
    pub fn default_value(self) -> Value {
        match self {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Complex => Value::Complex(0.0, 0.0),
            Type::Color => Value::Color([0.0; 4]),
            Type::Hyper => Value::Hyper([0.0; 4]),
            Type::String => Value::String(String::new()),
            _ => Value::Int(0),
        }
    }

    pub fn is_array(self) -> bool {
        self as u8 >= Type::VoidArray as u8
    }

    /// Whether the type is a numeric type the arithmetic operators accept.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Type::Int | Type::Float | Type::Complex | Type::Hyper
        )
    }

    /// Element type of an array type.
    pub fn element_type(self) -> Option<Type> {
        match self {
            Type::BoolArray => Some(Type::Bool),
            Type::IntArray => Some(Type::Int),
            Type::FloatArray => Some(Type::Float),
            Type::ComplexArray => Some(Type::Complex),
            Type::ColorArray => Some(Type::Color),
            Type::HyperArray => Some(Type::Hyper),
            _ => None,
        }
    }

    /// Array type whose elements have this type.
    pub fn array_of(self) -> Option<Type> {
        match self {
            Type::Bool => Some(Type::BoolArray),
            Type::Int => Some(Type::IntArray),
            Type::Float => Some(Type::FloatArray),
            Type::Complex => Some(Type::ComplexArray),
            Type::Color => Some(Type::ColorArray),
            Type::Hyper => Some(Type::HyperArray),
            _ => None,
        }
    }

    /// Formula-language spelling of the type.
    pub fn name(self) -> &'static str {
        match self {
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Float => "float",
            Type::Complex => "complex",
            Type::Color => "color",
            Type::String => "string",
            Type::Hyper => "hyper",
            Type::Gradient => "gradient",
            Type::Image => "image",
            Type::VoidArray => "void[]",
            Type::BoolArray => "bool[]",
            Type::IntArray => "int[]",
            Type::FloatArray => "float[]",
            Type::ComplexArray => "complex[]",
            Type::ColorArray => "color[]",
            Type::HyperArray => "hyper[]",
        }
    }

    /// Look up a type keyword (case-insensitive).
    pub fn from_name(name: &str) -> Option<Type> {
        match name.to_ascii_lowercase().as_str() {
            "bool" => Some(Type::Bool),
            "int" => Some(Type::Int),
            "float" => Some(Type::Float),
            "complex" => Some(Type::Complex),
            "color" => Some(Type::Color),
            "string" => Some(Type::String),
            "hyper" => Some(Type::Hyper),
            "grad" | "gradient" => Some(Type::Gradient),
            "image" => Some(Type::Image),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
