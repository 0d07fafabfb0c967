//! Parse error types.

use frm_ast::SyntaxError;
use frm_lexer::Token;
use std::fmt;

/// Parse error with source line and context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Kind of parse error
    pub kind: ParseErrorKind,
    /// 1-based source line where the error occurred
    pub line: usize,
    /// Human-readable error message
    pub message: String,
}

/// Category of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A different token was expected here.
    ///
    /// Example: `endif` missing, found `}` instead.
    UnexpectedToken,

    /// Input ended inside a formula.
    UnexpectedEof,

    /// Tokens are present but violate the grammar.
    ///
    /// Example: a three-component tuple `(1, 2, 3)`.
    InvalidSyntax,

    /// The lexer could not recognise a character.
    Lexical,
}

impl ParseError {
    /// Create an "expected token" error.
    pub fn expected_token(expected: Token, found: Option<Token>, line: usize) -> Self {
        let message = match &found {
            Some(token) => format!("expected '{}', found '{}'", expected, token),
            None => format!("expected '{}', found end of input", expected),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            line,
            message,
        }
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(found: Option<&Token>, context: &str, line: usize) -> Self {
        let (kind, message) = match found {
            Some(Token::Error(text)) => (
                ParseErrorKind::Lexical,
                format!("illegal character {} {}", text, context),
            ),
            Some(token) => (
                ParseErrorKind::UnexpectedToken,
                format!("unexpected '{}' {}", token, context),
            ),
            None => (
                ParseErrorKind::UnexpectedEof,
                format!("unexpected end of input {}", context),
            ),
        };
        Self {
            kind,
            line,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, line: usize) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            line,
            message: message.into(),
        }
    }

    /// The AST node embedded in a formula in place of the unparsed rest.
    pub fn to_syntax_error(&self) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: format!("Syntax error: {}", self.message),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}
