//! Code generation failures.
//!
//! Everything that goes wrong after translation is a bug in the compiler,
//! not in the formula: a well-typed IR tree always has code. Errors carry
//! the `Internal Compiler Error` prefix so callers can tell them apart from
//! translation diagnostics.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    /// An instruction template and its operands disagree.
    #[error("Internal Compiler Error: template '{template}': {message}")]
    Template { template: String, message: String },

    /// An IR shape no pass should have produced.
    #[error("Internal Compiler Error: {0}")]
    Internal(String),
}

impl CodegenError {
    pub fn internal(message: impl Into<String>) -> Self {
        CodegenError::Internal(message.into())
    }

    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        CodegenError::Template {
            template: template.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
