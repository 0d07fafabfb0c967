//! Hand-written recursive descent parser for formula files.
//!
//! ## Architecture
//!
//! - `stream`: TokenStream wrapper with lookahead
//! - `error`: ParseError and its kinds
//! - `formula`: formula blocks, sections and error recovery
//! - `stmt`: statement lists and control flow
//! - `settings`: `default:`-style setting lists and nested blocks
//! - `expr`: expression parser using Pratt parsing
//!
//! ## Error recovery
//!
//! The contract is "parse as many complete, valid formulas as possible". A
//! syntax error inside a formula becomes an error section of that formula
//! and parsing resumes at the next one. Errors outside any formula follow an
//! [`OrphanSyntaxErrorPolicy`].

mod error;
mod stream;

pub use error::{ParseError, ParseErrorKind};
use stream::TokenStream;

mod expr;
mod formula;
mod settings;
mod stmt;

use frm_ast::{Formlist, Formula};
use frm_lexer::{Lexeme, PreprocessorError, preprocess, tokenize};
use tracing::debug;

/// What to do with a syntax error that is not inside any formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanSyntaxErrorPolicy {
    /// Drop the error and skip to the next formula header. This is what
    /// formula libraries expect: stray text between formulas is ignored.
    #[default]
    Discard,
    /// Return the error to the caller alongside the formulas.
    Collect,
}

/// Preprocess, tokenize and parse a formula file.
///
/// # Parameters
///
/// * `source` - Raw file contents
///
/// # Returns
///
/// The formulas in file order with `last_line` filled in. Only a
/// preprocessor error fails the whole file.
pub fn parse(source: &str) -> Result<Formlist, PreprocessorError> {
    let text = preprocess(source)?;
    let lexemes = tokenize(&text);
    let mut formlist = parse_tokens(&lexemes);
    assign_last_lines(&mut formlist.formulas, line_count(source));
    debug!(formulas = formlist.formulas.len(), "parsed formula file");
    Ok(formlist)
}

/// Parse lexer output, discarding errors outside formulas.
pub fn parse_tokens(lexemes: &[Lexeme]) -> Formlist {
    parse_tokens_with(lexemes, OrphanSyntaxErrorPolicy::Discard).0
}

/// Parse lexer output with an explicit orphan-error policy.
///
/// # Returns
///
/// The formulas, and the orphan errors when `policy` is
/// [`OrphanSyntaxErrorPolicy::Collect`] (always empty otherwise).
pub fn parse_tokens_with(
    lexemes: &[Lexeme],
    policy: OrphanSyntaxErrorPolicy,
) -> (Formlist, Vec<ParseError>) {
    let mut stream = TokenStream::new(lexemes);
    formula::parse_formlist(&mut stream, policy)
}

fn line_count(source: &str) -> usize {
    source.lines().count().max(1)
}

/// Each formula ends on the line before the next one starts; the last one
/// runs to the end of the file.
fn assign_last_lines(formulas: &mut [Formula], total_lines: usize) {
    let starts: Vec<usize> = formulas.iter().map(|f| f.pos).collect();
    for (i, formula) in formulas.iter_mut().enumerate() {
        let end = match starts.get(i + 1) {
            Some(next) => next.saturating_sub(1),
            None => total_lines,
        };
        formula.last_line = end.max(formula.pos);
    }
}
