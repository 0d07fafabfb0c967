// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for formula files.
//!
//! Tokenization runs in two layers:
//!
//! - `RawToken`: the logos-generated scanner for operators, numbers,
//!   strings, identifiers and newlines. Whitespace and `;` comments are
//!   skipped here.
//! - [`tokenize`] drives the scanner and applies the context rules logos
//!   cannot express without backtracking: the greedy formula-id rule, comment
//!   formulas, the `i` suffix of imaginary literals, section headers and the
//!   keyword / type / constant lookup tables.
//!
//! Lexing never fails. Characters the scanner does not recognise become
//! [`Token::Error`] tokens and the parser decides what to do with them.
//!
//! # Examples
//!
//! ```
//! # use frm_lexer::{tokenize, Token};
//! let lexemes = tokenize("z = z^2 + #pixel\n");
//! assert_eq!(lexemes[0].token, Token::Ident("z".into()));
//! ```

pub mod preprocess;

pub use preprocess::{PreprocessorError, preprocess, preprocess_with};

use logos::Logos;
use std::fmt;
use std::ops::Range;

/// Scanner-level token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r";[^\n]*")]
enum RawToken {
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("=")]
    Assign,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("}")]
    RBrace,
    #[token("\n")]
    Newline,

    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    Number,

    #[regex(r#""[^"]*""#)]
    Str,

    #[regex(r"[@#]?[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Formula token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Operators ===
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    AndAnd,
    OrOr,
    Bang,
    Pipe,

    // === Delimiters ===
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    RBrace,
    Newline,

    // === Literals ===
    /// Numeric literal text.
    Number(String),
    /// Imaginary literal, text without the trailing `i`.
    Complex(String),
    /// String literal contents without the quotes.
    Str(String),
    /// Boolean constant (`true`, `false`, `yes`, `no`).
    Bool(bool),

    // === Names ===
    Ident(String),
    /// Lowercased type keyword.
    TypeName(String),
    /// Formula header text before the `{`, trimmed.
    FormId(String),
    /// `init:`, `loop:`, `bailout:`, `final:`, `global:`, `transform:`
    SectStm(String),
    /// `default:`, `switch:`, `builtin:`
    SectSet(String),
    /// `gradient:`, `fractal:`, `layer:`, `mapping:`, `formula:`,
    /// `inside:`, `outside:`, `alpha:`, `opacity:`
    SectParms(String),

    // === Keywords ===
    If,
    Elseif,
    Else,
    Endif,
    While,
    Endwhile,
    Repeat,
    Until,
    Param,
    Endparam,
    Func,
    Endfunc,
    Heading,
    Endheading,

    /// Text the scanner could not recognise.
    Error(String),
}

impl Token {
    /// Upper-case token kind name, as used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::Number(_) => "NUMBER",
            Token::Complex(_) => "COMPLEX",
            Token::Str(_) => "STRING",
            Token::Bool(_) => "CONST",
            Token::Ident(_) => "ID",
            Token::TypeName(_) => "TYPE",
            Token::FormId(_) => "FORM_ID",
            Token::SectStm(_) => "SECT_STM",
            Token::SectSet(_) => "SECT_SET",
            Token::SectParms(_) => "SECT_PARMS",
            Token::Newline => "NEWLINE",
            Token::Error(_) => "ERROR",
            _ => "SYMBOL",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Number(n) => return write!(f, "{}", n),
            Token::Complex(n) => return write!(f, "{}i", n),
            Token::Str(s) => return write!(f, "\"{}\"", s),
            Token::Bool(b) => return write!(f, "{}", b),
            Token::Ident(s) | Token::TypeName(s) => return f.write_str(s),
            Token::FormId(s) => return write!(f, "{} {{", s),
            Token::SectStm(s) | Token::SectSet(s) | Token::SectParms(s) => {
                return write!(f, "{}:", s);
            }
            Token::Error(s) => return write!(f, "'{}'", s),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Assign => "=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Pipe => "|",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::RBrace => "}",
            Token::Newline => "newline",
            Token::If => "if",
            Token::Elseif => "elseif",
            Token::Else => "else",
            Token::Endif => "endif",
            Token::While => "while",
            Token::Endwhile => "endwhile",
            Token::Repeat => "repeat",
            Token::Until => "until",
            Token::Param => "param",
            Token::Endparam => "endparam",
            Token::Func => "func",
            Token::Endfunc => "endfunc",
            Token::Heading => "heading",
            Token::Endheading => "endheading",
        };
        f.write_str(s)
    }
}

/// A token with its 1-based line number and byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
    pub span: Range<usize>,
}

const STM_SECTIONS: &[&str] = &["global", "transform", "init", "loop", "final", "bailout"];
const SET_SECTIONS: &[&str] = &["default", "switch", "builtin"];
const PARMS_SECTIONS: &[&str] = &[
    "gradient", "fractal", "layer", "mapping", "formula", "inside", "outside", "alpha", "opacity",
];

const TYPE_NAMES: &[&str] = &[
    "bool", "int", "float", "complex", "color", "string", "hyper", "grad", "image",
];

fn keyword(lower: &str) -> Option<Token> {
    let t = match lower {
        "if" => Token::If,
        "elseif" => Token::Elseif,
        "else" => Token::Else,
        "endif" => Token::Endif,
        "while" => Token::While,
        "endwhile" => Token::Endwhile,
        "repeat" => Token::Repeat,
        "until" => Token::Until,
        "param" => Token::Param,
        "endparam" => Token::Endparam,
        "func" => Token::Func,
        "endfunc" => Token::Endfunc,
        "heading" => Token::Heading,
        "endheading" => Token::Endheading,
        "true" | "yes" => Token::Bool(true),
        "false" | "no" => Token::Bool(false),
        _ => return None,
    };
    Some(t)
}

/// Byte offsets where each line starts; used to map spans to line numbers.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

/// Length of a formula header starting at `pos`, including the `{`.
///
/// The rule is deliberately greedy: any run of characters other than
/// newline, `;`, `"` and braces, immediately followed by `{`. Because it must
/// reach a `{` on the same line it never fires inside ordinary expressions.
fn match_form_id(rest: &str) -> Option<usize> {
    let end = rest.find(['\r', '\n', ';', '"', '{', '}'])?;
    if end > 0 && rest[end..].starts_with('{') && !rest[..end].trim().is_empty() {
        Some(end + 1)
    } else {
        None
    }
}

/// Length of a comment formula (`comment { ... }` or `;comment { ... }`).
fn match_comment_formula(rest: &str) -> Option<usize> {
    let body = rest.strip_prefix(';').unwrap_or(rest);
    if body.len() < 7 || !body.is_char_boundary(7) || !body[..7].eq_ignore_ascii_case("comment") {
        return None;
    }
    let after = body[7..].trim_start_matches([' ', '\t']);
    if !after.starts_with('{') {
        return None;
    }
    let open = rest.len() - after.len();
    let close = after.find('}')?;
    Some(open + close + 1)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize preprocessed formula source.
///
/// # Parameters
///
/// * `source` - Formula text, normally the output of [`preprocess`]
///
/// # Returns
///
/// Every token in order with 1-based line numbers. Never fails.
pub fn tokenize(source: &str) -> Vec<Lexeme> {
    let lines = LineIndex::new(source);
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let leading = rest.len() - rest.trim_start_matches([' ', '\t', '\r']).len();

        if let Some(len) = match_comment_formula(&rest[leading..]) {
            pos += leading + len;
            continue;
        }

        if let Some(len) = match_form_id(rest) {
            let text = rest[..len - 1].trim();
            out.push(Lexeme {
                token: Token::FormId(text.to_string()),
                line: lines.line(pos + leading),
                span: pos + leading..pos + len,
            });
            pos += len;
            continue;
        }

        let mut lexer = RawToken::lexer(rest);
        let Some(raw) = lexer.next() else {
            break;
        };
        let span = lexer.span();
        let slice = lexer.slice();
        let start = pos + span.start;
        let mut end = pos + span.end;

        let token = match raw {
            Err(()) => Token::Error(slice.to_string()),
            Ok(RawToken::Number) => {
                let tail = &source[end..];
                let mut chars = tail.chars();
                let imaginary = matches!(chars.next(), Some('i' | 'I'))
                    && !chars.next().is_some_and(is_ident_char);
                if imaginary {
                    end += 1;
                    Token::Complex(slice.to_string())
                } else {
                    Token::Number(slice.to_string())
                }
            }
            Ok(RawToken::Str) => Token::Str(slice[1..slice.len() - 1].replace("\\\n", "")),
            Ok(RawToken::Ident) => {
                let lower = slice.to_ascii_lowercase();
                let tail = &source[end..];
                let colon = tail.len() - tail.trim_start_matches([' ', '\t']).len();
                let is_header = tail[colon..].starts_with(':');
                if is_header && STM_SECTIONS.contains(&lower.as_str()) {
                    end += colon + 1;
                    Token::SectStm(lower)
                } else if is_header && SET_SECTIONS.contains(&lower.as_str()) {
                    end += colon + 1;
                    Token::SectSet(lower)
                } else if is_header && PARMS_SECTIONS.contains(&lower.as_str()) {
                    end += colon + 1;
                    Token::SectParms(lower)
                } else if let Some(kw) = keyword(&lower) {
                    kw
                } else if TYPE_NAMES.contains(&lower.as_str()) {
                    Token::TypeName(lower)
                } else {
                    Token::Ident(slice.to_string())
                }
            }
            Ok(raw) => simple_token(raw),
        };

        out.push(Lexeme {
            token,
            line: lines.line(start),
            span: start..end,
        });
        pos = end;
    }

    out
}

fn simple_token(raw: RawToken) -> Token {
    match raw {
        RawToken::Plus => Token::Plus,
        RawToken::Minus => Token::Minus,
        RawToken::Star => Token::Star,
        RawToken::Slash => Token::Slash,
        RawToken::Percent => Token::Percent,
        RawToken::Caret => Token::Caret,
        RawToken::EqEq => Token::EqEq,
        RawToken::NotEq => Token::NotEq,
        RawToken::Lt => Token::Lt,
        RawToken::Le => Token::Le,
        RawToken::Gt => Token::Gt,
        RawToken::Ge => Token::Ge,
        RawToken::Assign => Token::Assign,
        RawToken::AndAnd => Token::AndAnd,
        RawToken::OrOr => Token::OrOr,
        RawToken::Bang => Token::Bang,
        RawToken::Pipe => Token::Pipe,
        RawToken::LParen => Token::LParen,
        RawToken::RParen => Token::RParen,
        RawToken::LBracket => Token::LBracket,
        RawToken::RBracket => Token::RBracket,
        RawToken::Comma => Token::Comma,
        RawToken::Colon => Token::Colon,
        RawToken::RBrace => Token::RBrace,
        RawToken::Newline => Token::Newline,
        // Carry data and are handled by the caller.
        RawToken::Number | RawToken::Str | RawToken::Ident => {
            Token::Error(String::new())
        }
    }
}
