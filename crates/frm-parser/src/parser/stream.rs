//! Token stream wrapper for the hand-written parser.

use frm_lexer::{Lexeme, Token};

use super::ParseError;

/// Token stream with lookahead and line tracking.
///
/// Wraps the lexer output for the recursive descent parser. Every lexeme
/// carries its 1-based line, which is all the position information the
/// formula language reports.
pub struct TokenStream<'src> {
    tokens: &'src [Lexeme],
    pos: usize,
}

impl<'src> TokenStream<'src> {
    pub fn new(tokens: &'src [Lexeme]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&'src Token> {
        self.tokens.get(self.pos).map(|l| &l.token)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&'src Token> {
        self.tokens.get(self.pos + n).map(|l| &l.token)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&'src Token> {
        let token = self.tokens.get(self.pos).map(|l| &l.token);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token has the same kind as `expected`.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Expect a specific token kind and advance if it matches.
    ///
    /// Returns the line of the consumed token.
    pub fn expect(&mut self, expected: Token) -> Result<usize, ParseError> {
        if self.check(&expected) {
            let line = self.line();
            self.advance();
            Ok(line)
        } else {
            Err(ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.line(),
            ))
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Line of the current token, or of the last token at end of input.
    pub fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |l| l.line)
    }

    /// Skip newline tokens.
    pub fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.pos += 1;
        }
    }

    /// Skip statement separators (newlines and commas).
    pub fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Comma)) {
            self.pos += 1;
        }
    }

    /// Skip to the end of the current formula for error recovery.
    ///
    /// Consumes up to and including the closing `}`. Stops without consuming
    /// if the next formula header is reached first.
    pub fn synchronize(&mut self) {
        while let Some(token) = self.peek() {
            match token {
                Token::FormId(_) => break,
                Token::RBrace => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the next formula header.
    pub fn skip_to_formula(&mut self) {
        while !self.at_end() && !matches!(self.peek(), Some(Token::FormId(_))) {
            self.advance();
        }
    }
}
