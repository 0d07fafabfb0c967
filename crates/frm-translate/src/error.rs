//! Translation diagnostics.
//!
//! Translation never stops at the first problem: every diagnostic for a
//! formula is collected, in source order, on the translated formula.
//!
//! # Design
//!
//! - `TranslateError` - a single diagnostic with its source line
//! - `ErrorKind` - what went wrong
//! - `Severity` - error or warning
//!
//! Internal compiler errors are a distinct kind and render with their own
//! prefix so they are never mistaken for a problem in the user's formula.

use std::fmt;
use thiserror::Error;

/// Category of translation diagnostic.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// Syntax error carried over from the parser
    Syntax = 0,
    /// Assignment or declaration that would shadow the standard library
    NoOverride = 1,
    /// Expression has a type that cannot be converted to the expected one
    TypeMismatch = 2,
    /// No overload of an operator or function accepts the argument types
    NoMatchingOverload = 3,
    /// Enumerated parameter compared with a string it does not declare
    UnknownEnumValue = 4,
    /// A function name used where a value is expected
    NotAValue = 5,
    /// Array used with the wrong number of indices or non-constant size
    ArrayArity = 6,
    /// Assignment to something that is not a variable
    InvalidAssignment = 7,
    /// Variable declared twice with different types
    Redeclaration = 8,
    /// Name that is neither a variable nor a function
    UndefinedName = 9,
    /// Formula has no bailout condition
    MissingBailout = 10,
    /// Both a legacy and an explicit section define the same phase
    AmbiguousSection = 11,
    /// Value was converted implicitly to the expected type
    ImplicitConversion = 12,
    /// Malformed default-section entry
    InvalidSetting = 13,
    /// Internal compiler error (bug in the compiler)
    Internal = 14,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "syntax error",            // 0: Syntax
    "no override",             // 1: NoOverride
    "type mismatch",           // 2: TypeMismatch
    "no matching overload",    // 3: NoMatchingOverload
    "unknown enum value",      // 4: UnknownEnumValue
    "not a value",             // 5: NotAValue
    "array arity",             // 6: ArrayArity
    "invalid assignment",      // 7: InvalidAssignment
    "redeclaration",           // 8: Redeclaration
    "undefined name",          // 9: UndefinedName
    "missing bailout",         // 10: MissingBailout
    "ambiguous section",       // 11: AmbiguousSection
    "implicit conversion",     // 12: ImplicitConversion
    "invalid setting",         // 13: InvalidSetting
    "internal compiler error", // 14: Internal
];

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Formula translates, but something is suspicious
    Warning,
    /// Formula cannot be compiled
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One translation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct TranslateError {
    pub kind: ErrorKind,
    pub severity: Severity,
    /// 1-based source line
    pub line: usize,
    pub message: String,
}

impl TranslateError {
    /// Creates a new error diagnostic.
    ///
    /// # Parameters
    ///
    /// * `kind` - Error category
    /// * `line` - Source line the error refers to
    /// * `message` - Human-readable error message
    pub fn new(kind: ErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }

    /// Creates an internal compiler error.
    pub fn internal(line: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, line, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn render(&self) -> String {
        match (self.kind, self.severity) {
            (ErrorKind::Internal, _) => {
                format!("Internal Compiler Error: {}: {}", self.line, self.message)
            }
            (_, Severity::Warning) => format!("Warning: {}: {}", self.line, self.message),
            (_, Severity::Error) => format!("{}: {}", self.line, self.message),
        }
    }
}

/// Result type for translation steps.
pub type Result<T> = std::result::Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_cover_all_kinds() {
        assert_eq!(ErrorKind::Internal.name(), "internal compiler error");
        assert_eq!(ERROR_KIND_NAMES.len(), ErrorKind::Internal as usize + 1);
    }

    #[test]
    fn test_rendering() {
        let e = TranslateError::new(ErrorKind::TypeMismatch, 3, "bad");
        assert_eq!(e.to_string(), "3: bad");
        let w = TranslateError::warning(ErrorKind::MissingBailout, 1, "none");
        assert_eq!(w.to_string(), "Warning: 1: none");
        let i = TranslateError::internal(7, "oops");
        assert!(i.to_string().starts_with("Internal Compiler Error"));
    }
}
