//! Hand-written recursive descent parser for formula files.
//!
//! Turns the lexer's token stream into a [`frm_ast::Formlist`]. One
//! malformed formula never prevents its neighbours from parsing.

pub mod parser;

pub use parser::{
    OrphanSyntaxErrorPolicy, ParseError, ParseErrorKind, parse, parse_tokens, parse_tokens_with,
};

// Re-export lexer
pub use frm_lexer::Token;
