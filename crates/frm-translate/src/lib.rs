// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Semantic analysis for formulas.
//!
//! Takes a parsed [`frm_ast::Formula`] and produces typed tree IR, one tree
//! per executable section, together with the symbol table and parameter
//! layout the generated code is built around.
//!
//! - [`symbol`] - symbol table, structured names and the standard library
//! - [`ir`] - the tree IR
//! - [`translate`] - AST to IR translation per formula kind
//! - [`error`] - translation diagnostics

pub mod error;
pub mod ir;
pub mod symbol;
pub mod translate;

pub use error::{ErrorKind, Result, Severity, TranslateError};
pub use ir::{ARRAY_READ, Exp, Label, Stm};
pub use symbol::{FuncParam, NameKind, Symbol, SymbolName, SymbolTable, Var, stdlib};
pub use translate::{
    BAILOUT_VAR, FormulaKind, FuncInfo, MetaValue, ParamInfo, SECTION_ORDER, TranslateOptions,
    TranslatedFormula, const_eval, translate,
};
