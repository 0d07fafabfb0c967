//! Driver failures.

use std::path::PathBuf;

use frm_codegen::CodegenError;
use frm_lexer::PreprocessorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A formula file could not be located.
    #[error("{0} not found in search path")]
    NotFound(String),

    #[error("{file}:{source}")]
    Preprocess {
        file: String,
        #[source]
        source: PreprocessorError,
    },

    /// Inline source that contains no formula block.
    #[error("no formula found in inline source")]
    NoFormula,

    /// Translation errors of a formula, in the order they were found.
    #[error("errors in formula '{id}':\n{}", .errors.join("\n"))]
    Formula { id: String, errors: Vec<String> },

    /// The external C compiler exited unsuccessfully.
    #[error("Error compiling generated C code ({status}):\n{output}")]
    CCompiler { status: String, output: String },

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl CompilerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompilerError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that point at a bug in the compiler itself.
    pub fn is_internal(&self) -> bool {
        matches!(self, CompilerError::Codegen(_))
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
