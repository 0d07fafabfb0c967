//! Expression parser using Pratt parsing (precedence climbing).
//!
//! ## Precedence Levels (lowest to highest)
//!
//! 1. `,` - statement / argument / tuple separator, handled by callers
//! 2. `=` (Assign) - right associative
//! 3. `||`, `&&` - left associative, one level
//! 4. `==`, `!=`, `<`, `<=`, `>`, `>=` - left associative
//! 5. `+`, `-` - left associative
//! 6. `*`, `/`, `%` - left associative
//! 7. `^`, unary `-`, `!` - right associative, one level
//!
//! Because unary minus and power share a level, `-z^2` is `-(z^2)` and
//! `z^-2` is `z^(-2)`.

mod atoms;
mod pratt;

use super::{ParseError, TokenStream};
use frm_ast::{Expr, ExprKind};
use frm_lexer::Token;

/// Parse an expression, including assignment.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let target = pratt::parse_pratt(stream, 0)?;

    if matches!(stream.peek(), Some(Token::Assign)) {
        let line = stream.line();
        stream.advance();
        let value = parse_expr(stream)?;
        return Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            line,
        ));
    }

    Ok(target)
}

/// Parse an expression that may not be an assignment.
///
/// Used for setting values, where `=` has already been consumed.
pub(super) fn parse_value(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    pratt::parse_pratt(stream, 0)
}

/// Parse a comma-separated list up to (and including) `close`.
pub(super) fn parse_list(stream: &mut TokenStream, close: Token) -> Result<Vec<Expr>, ParseError> {
    let mut items = Vec::new();
    if stream.check(&close) {
        stream.advance();
        return Ok(items);
    }

    loop {
        items.push(parse_expr(stream)?);
        if stream.check(&close) {
            stream.advance();
            return Ok(items);
        }
        stream.expect(Token::Comma)?;
    }
}
