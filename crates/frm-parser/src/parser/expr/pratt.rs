//! Pratt parser core - precedence climbing for binary and unary operators.

use super::super::{ParseError, TokenStream};
use super::atoms;
use frm_ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use frm_lexer::Token;

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Binding power of `^` and of the prefix operators.
const POWER_PREC: u8 = 50;

/// Get binary operator metadata (precedence, associativity, and operator enum).
///
/// Returns (precedence, associativity, op) where higher precedence = tighter binding.
/// This is the single source of truth for binary operator parsing.
fn binary_op_info(token: &Token) -> Option<(u8, Assoc, BinaryOp)> {
    match token {
        Token::OrOr => Some((10, Assoc::Left, BinaryOp::Or)),
        Token::AndAnd => Some((10, Assoc::Left, BinaryOp::And)),
        Token::EqEq => Some((20, Assoc::Left, BinaryOp::Eq)),
        Token::NotEq => Some((20, Assoc::Left, BinaryOp::Ne)),
        Token::Lt => Some((20, Assoc::Left, BinaryOp::Lt)),
        Token::Le => Some((20, Assoc::Left, BinaryOp::Le)),
        Token::Gt => Some((20, Assoc::Left, BinaryOp::Gt)),
        Token::Ge => Some((20, Assoc::Left, BinaryOp::Ge)),
        Token::Plus => Some((30, Assoc::Left, BinaryOp::Add)),
        Token::Minus => Some((30, Assoc::Left, BinaryOp::Sub)),
        Token::Star => Some((40, Assoc::Left, BinaryOp::Mul)),
        Token::Slash => Some((40, Assoc::Left, BinaryOp::Div)),
        Token::Percent => Some((40, Assoc::Left, BinaryOp::Mod)),
        Token::Caret => Some((POWER_PREC, Assoc::Right, BinaryOp::Pow)),
        _ => None,
    }
}

/// Pratt parser - handles binary operators with precedence climbing.
pub(super) fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        let Some((prec, assoc, op)) = binary_op_info(token) else {
            break;
        };
        if prec < min_prec {
            break;
        }

        let line = stream.line();
        stream.advance();

        let next_prec = if assoc == Assoc::Left { prec + 1 } else { prec };
        let right = parse_pratt(stream, next_prec)?;

        left = Expr::binop(op, left, right, line);
    }

    Ok(left)
}

/// Parse prefix expressions (unary operators, atoms).
fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let op = match stream.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Bang) => UnaryOp::Not,
        Some(Token::Plus) => {
            stream.advance();
            return parse_pratt(stream, POWER_PREC);
        }
        _ => return atoms::parse_atom(stream),
    };

    let line = stream.line();
    stream.advance();
    let operand = parse_pratt(stream, POWER_PREC)?;

    Ok(Expr::new(
        ExprKind::Unop {
            op,
            operand: Box::new(operand),
        },
        line,
    ))
}
