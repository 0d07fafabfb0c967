//! Abstract syntax tree produced by the parser.
//!
//! The tree is single-owner and immutable once the parser returns it: the
//! only decoration, [`Formula::last_line`], is filled in by the parser
//! itself. Inferred types are not stored here; the translator records them
//! in the IR it builds.

mod expr;
mod formula;

pub use expr::{Expr, ExprKind, Stmt, StmtKind};
pub use formula::{
    Formlist, Formula, NAMELESS_LOOP_SECTION, NAMELESS_SECTION, Section, SectionBody, SetValue,
    Setting, SettingKind, SyntaxError,
};
