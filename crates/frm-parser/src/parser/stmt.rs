//! Statement lists: declarations, control flow and expression statements.

use super::expr::{parse_expr, parse_list};
use super::{ParseError, TokenStream};
use frm_ast::{Stmt, StmtKind, Type};
use frm_lexer::Token;

/// Whether `token` ends a statement list.
///
/// Section headers, block keywords, the formula's `}` and the Fractint `:`
/// separator all close the current list; the caller decides which of them
/// it expects.
fn ends_stmt_list(token: Option<&Token>) -> bool {
    matches!(
        token,
        None | Some(
            Token::RBrace
                | Token::FormId(_)
                | Token::SectStm(_)
                | Token::SectSet(_)
                | Token::SectParms(_)
                | Token::Colon
                | Token::Elseif
                | Token::Else
                | Token::Endif
                | Token::Endwhile
                | Token::Until
        )
    )
}

/// Parse statements separated by newlines or commas.
pub(super) fn parse_stmt_list(stream: &mut TokenStream) -> Result<Vec<Stmt>, ParseError> {
    let mut stmts = Vec::new();

    loop {
        stream.skip_separators();
        if ends_stmt_list(stream.peek()) {
            break;
        }

        stmts.push(parse_stmt(stream)?);

        match stream.peek() {
            Some(Token::Newline | Token::Comma) => {}
            t if ends_stmt_list(t) => break,
            other => {
                return Err(ParseError::unexpected_token(
                    other,
                    "after statement",
                    stream.line(),
                ));
            }
        }
    }

    Ok(stmts)
}

fn parse_stmt(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    match stream.peek() {
        Some(Token::If) => parse_if(stream),
        Some(Token::While) => parse_while(stream),
        Some(Token::Repeat) => parse_repeat(stream),
        Some(Token::TypeName(ty)) if matches!(stream.peek_nth(1), Some(Token::Ident(_))) => {
            parse_decl(stream, ty)
        }
        _ => {
            let expr = parse_expr(stream)?;
            let line = expr.pos;
            Ok(Stmt::new(StmtKind::Expr(expr), line))
        }
    }
}

/// `TYPE name [= expr]` or `TYPE name[dims]`.
fn parse_decl(stream: &mut TokenStream, ty_name: &str) -> Result<Stmt, ParseError> {
    let line = stream.line();
    let ty = Type::from_name(ty_name)
        .ok_or_else(|| ParseError::invalid_syntax(format!("unknown type '{}'", ty_name), line))?;
    stream.advance();

    let name = match stream.advance() {
        Some(Token::Ident(name)) => name.clone(),
        other => return Err(ParseError::unexpected_token(other, "in declaration", line)),
    };

    let kind = match stream.peek() {
        Some(Token::Assign) => {
            stream.advance();
            StmtKind::Decl {
                ty,
                name,
                init: Some(parse_expr(stream)?),
            }
        }
        Some(Token::LBracket) => {
            stream.advance();
            let dims = parse_list(stream, Token::RBracket)?;
            if dims.is_empty() {
                return Err(ParseError::invalid_syntax(
                    format!("array '{}' needs at least one dimension", name),
                    line,
                ));
            }
            StmtKind::DeclArray { ty, name, dims }
        }
        _ => StmtKind::Decl {
            ty,
            name,
            init: None,
        },
    };

    Ok(Stmt::new(kind, line))
}

/// `if cond ... [elseif cond ...]* [else ...] endif`
///
/// Each `elseif` becomes a nested `If` in the enclosing `otherwise`, and the
/// innermost one consumes the shared `endif`.
fn parse_if(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let line = stream.line();
    stream.advance();

    let cond = parse_expr(stream)?;
    let then = parse_stmt_list(stream)?;

    let otherwise = match stream.peek() {
        Some(Token::Elseif) => vec![parse_if(stream)?],
        Some(Token::Else) => {
            stream.advance();
            let body = parse_stmt_list(stream)?;
            stream.expect(Token::Endif)?;
            body
        }
        _ => {
            stream.expect(Token::Endif)?;
            Vec::new()
        }
    };

    Ok(Stmt::new(
        StmtKind::If {
            cond,
            then,
            otherwise,
        },
        line,
    ))
}

fn parse_while(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let line = stream.line();
    stream.advance();

    let cond = parse_expr(stream)?;
    let body = parse_stmt_list(stream)?;
    stream.expect(Token::Endwhile)?;

    Ok(Stmt::new(StmtKind::While { cond, body }, line))
}

fn parse_repeat(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let line = stream.line();
    stream.advance();

    let body = parse_stmt_list(stream)?;
    stream.expect(Token::Until)?;
    let until = parse_expr(stream)?;

    Ok(Stmt::new(StmtKind::Repeat { body, until }, line))
}
