// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST and type model for the formula compiler.
//!
//! This crate contains the syntax tree the parser builds and the foundation
//! types (data types, constant values, operators) every later stage uses.

pub mod ast;
pub mod foundation;

pub use ast::*;
pub use foundation::{BinaryOp, SCALAR_TYPES, Type, UnaryOp, Value};
