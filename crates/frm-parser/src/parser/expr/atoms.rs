//! Atomic expressions - literals, identifiers, calls, tuples and magnitudes.

use super::super::{ParseError, TokenStream};
use super::{parse_expr, parse_list};
use frm_ast::{Expr, ExprKind, Value};
use frm_lexer::Token;

/// Parse atomic expressions.
pub(super) fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let line = stream.line();

    match stream.peek() {
        Some(Token::Number(text)) => {
            stream.advance();
            Ok(Expr::constant(parse_number(text, line)?, line))
        }
        Some(Token::Complex(text)) => {
            stream.advance();
            let im = parse_float(text, line)?;
            Ok(Expr::constant(Value::Complex(0.0, im), line))
        }
        Some(Token::Bool(b)) => {
            stream.advance();
            Ok(Expr::constant(Value::Bool(*b), line))
        }
        Some(Token::Str(s)) => {
            stream.advance();
            Ok(Expr::new(ExprKind::String(s.clone()), line))
        }
        Some(Token::Ident(name)) => {
            stream.advance();
            parse_identifier(stream, name, line)
        }
        Some(Token::TypeName(name)) if matches!(stream.peek_nth(1), Some(Token::LParen)) => {
            // Type constructor: complex(a, b), hyper(...), color(...)
            stream.advance();
            stream.advance();
            let args = parse_list(stream, Token::RParen)?;
            Ok(Expr::funcall(name.clone(), args, line))
        }
        Some(Token::LParen) => parse_parenthesized(stream),
        Some(Token::Pipe) => {
            stream.advance();
            let inner = parse_expr(stream)?;
            stream.expect(Token::Pipe)?;
            Ok(Expr::funcall("cmag", vec![inner], line))
        }
        other => Err(ParseError::unexpected_token(other, "in expression", line)),
    }
}

/// An identifier, call or array lookup whose name has been consumed.
fn parse_identifier(stream: &mut TokenStream, name: &str, line: usize) -> Result<Expr, ParseError> {
    match stream.peek() {
        Some(Token::LParen) => {
            stream.advance();
            let args = parse_list(stream, Token::RParen)?;
            Ok(Expr::funcall(name, args, line))
        }
        Some(Token::LBracket) => {
            stream.advance();
            let indices = parse_list(stream, Token::RBracket)?;
            if indices.is_empty() {
                return Err(ParseError::invalid_syntax(
                    format!("array lookup of '{}' needs an index", name),
                    line,
                ));
            }
            Ok(Expr::new(
                ExprKind::ArrayLookup {
                    name: name.to_string(),
                    indices,
                },
                line,
            ))
        }
        _ => Ok(Expr::id(name, line)),
    }
}

/// `(e)`, `(re, im)` or `(a, b, c, d)`.
///
/// Tuples become constructor calls so the translator can fold constant
/// components and coerce the rest.
fn parse_parenthesized(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let line = stream.expect(Token::LParen)?;
    let mut items = parse_list(stream, Token::RParen)?;

    match items.len() {
        1 => Ok(items.remove(0)),
        2 => Ok(Expr::funcall("complex", items, line)),
        4 => Ok(Expr::funcall("hyper", items, line)),
        0 => Err(ParseError::invalid_syntax("empty parentheses", line)),
        n => Err(ParseError::invalid_syntax(
            format!("a tuple must have 2 or 4 components, not {}", n),
            line,
        )),
    }
}

fn parse_number(text: &str, line: usize) -> Result<Value, ParseError> {
    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
    }
    parse_float(text, line).map(Value::Float)
}

fn parse_float(text: &str, line: usize) -> Result<f64, ParseError> {
    text.parse::<f64>()
        .map_err(|_| ParseError::invalid_syntax(format!("invalid number '{}'", text), line))
}
