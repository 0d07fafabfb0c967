// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Formula compiler driver.
//!
//! Ties the pipeline together: formula files are found on per-kind search
//! paths and parsed once per modification, formulas are translated and
//! merged into a compilation unit, and the generated C is built into a
//! shared object by the system C compiler. Artifacts are cached by a hash
//! of the code and the compile command.
//!
//! - [`compiler`] - the [`Compiler`] value and its operations
//! - [`cache`] - formula file cache and artifact naming
//! - [`options`] - configuration and formula file kinds
//! - [`error`] - driver errors

pub mod cache;
pub mod compiler;
pub mod error;
pub mod options;

pub use cache::{FileCache, artifact_hash};
pub use compiler::{Compiler, INNER_PREFIX, OUTER_PREFIX, link};
pub use error::{CompilerError, Result};
pub use options::{CACHE_DIR_ENV, CC_ENV, CompilerOptions, FileKind};

pub use frm_codegen::CodegenOptions;
pub use frm_translate::{FormulaKind, TranslateOptions, TranslatedFormula};
