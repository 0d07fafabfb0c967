//! Formula blocks and their sections, with per-formula error recovery.

use super::settings::parse_setting_list;
use super::stmt::parse_stmt_list;
use super::{OrphanSyntaxErrorPolicy, ParseError, TokenStream};
use frm_ast::{
    Formlist, Formula, NAMELESS_LOOP_SECTION, NAMELESS_SECTION, Section, SectionBody,
};
use frm_lexer::Token;
use tracing::debug;

/// Parse every formula in the stream.
///
/// A syntax error inside a formula is embedded in that formula and parsing
/// resumes after its closing `}`. Errors outside any formula are handled per
/// `policy`.
pub(super) fn parse_formlist(
    stream: &mut TokenStream,
    policy: OrphanSyntaxErrorPolicy,
) -> (Formlist, Vec<ParseError>) {
    let mut formlist = Formlist::default();
    let mut orphans = Vec::new();

    loop {
        stream.skip_newlines();
        match stream.peek() {
            None => break,
            Some(Token::FormId(header)) => {
                let line = stream.line();
                stream.advance();
                formlist.formulas.push(parse_formula(stream, header, line));
            }
            other => {
                let err = ParseError::unexpected_token(other, "outside any formula", stream.line());
                match policy {
                    OrphanSyntaxErrorPolicy::Discard => {
                        debug!(line = err.line, error = %err.message, "discarding orphan syntax error");
                    }
                    OrphanSyntaxErrorPolicy::Collect => orphans.push(err),
                }
                stream.skip_to_formula();
            }
        }
    }

    (formlist, orphans)
}

/// Split a header into the formula id and an optional symmetry annotation:
/// `mandel (XAXIS)` is id `mandel`, symmetry `XAXIS`.
fn split_header(header: &str) -> (String, Option<String>) {
    if let Some(body) = header.strip_suffix(')') {
        if let Some(open) = body.rfind('(') {
            let id = body[..open].trim();
            if !id.is_empty() {
                let symmetry = body[open + 1..].trim();
                let symmetry = (!symmetry.is_empty()).then(|| symmetry.to_string());
                return (id.to_string(), symmetry);
            }
        }
    }
    (header.trim().to_string(), None)
}

fn parse_formula(stream: &mut TokenStream, header: &str, line: usize) -> Formula {
    let (id, symmetry) = split_header(header);
    let mut formula = Formula::new(id, line);
    formula.symmetry = symmetry;

    if let Err(err) = parse_formula_body(stream, &mut formula) {
        debug!(formula = %formula.id, line = err.line, error = %err.message, "syntax error");
        formula.sections.push(Section {
            name: "error".to_string(),
            pos: err.line,
            body: SectionBody::Error(err.to_syntax_error()),
        });
        stream.synchronize();
    }

    formula
}

fn parse_formula_body(stream: &mut TokenStream, formula: &mut Formula) -> Result<(), ParseError> {
    stream.skip_separators();

    if !is_section_header(stream.peek()) {
        // Legacy body: statements without section headers, optionally split
        // by a Fractint `:` into an init part and a loop part.
        let pos = stream.line();
        let stmts = parse_stmt_list(stream)?;
        formula.sections.push(Section {
            name: NAMELESS_SECTION.to_string(),
            pos,
            body: SectionBody::Stmts(stmts),
        });

        if stream.check(&Token::Colon) {
            stream.advance();
            let pos = stream.line();
            let stmts = parse_stmt_list(stream)?;
            formula.sections.push(Section {
                name: NAMELESS_LOOP_SECTION.to_string(),
                pos,
                body: SectionBody::Stmts(stmts),
            });
        }
    }

    loop {
        stream.skip_separators();
        let pos = stream.line();
        match stream.peek() {
            Some(Token::SectStm(name)) => {
                stream.advance();
                let stmts = parse_stmt_list(stream)?;
                formula.sections.push(Section {
                    name: name.clone(),
                    pos,
                    body: SectionBody::Stmts(stmts),
                });
            }
            Some(Token::SectSet(name) | Token::SectParms(name)) => {
                stream.advance();
                let settings = parse_setting_list(stream)?;
                formula.sections.push(Section {
                    name: name.clone(),
                    pos,
                    body: SectionBody::Settings(settings),
                });
            }
            Some(Token::RBrace) => {
                stream.advance();
                return Ok(());
            }
            other => {
                return Err(ParseError::unexpected_token(other, "in formula body", pos));
            }
        }
    }
}

fn is_section_header(token: Option<&Token>) -> bool {
    matches!(
        token,
        Some(Token::SectStm(_) | Token::SectSet(_) | Token::SectParms(_))
    )
}
