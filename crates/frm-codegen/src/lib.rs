// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Back end of the formula compiler.
//!
//! Turns translated IR into a self-contained C source file implementing the
//! `pf_*` shared-object ABI.
//!
//! - [`canon`] - `ESeq` hoisting, basic blocks and trace scheduling
//! - [`codegen`] - instruction selection over canonical IR
//! - [`optimize`] - peephole rewrites of selected instructions
//! - [`emit`] - the C file around the generated code
//! - [`insn`] - instructions and operands
//! - [`error`] - internal compiler errors

pub mod canon;
pub mod codegen;
pub mod emit;
pub mod error;
pub mod insn;
pub mod optimize;

pub use canon::{Block, Canonicalizer};
pub use codegen::{CodeGen, CodegenOptions, Scalar};
pub use emit::{EXPORTED_SYMBOLS, N_POS_PARAMS, generate};
pub use error::{CodegenError, Result};
pub use insn::{Arg, Insn, ScalarOp};
