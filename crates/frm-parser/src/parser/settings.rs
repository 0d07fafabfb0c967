//! Setting lists: `name = value` entries and `param` / `func` / `heading`
//! blocks.

use super::expr::{parse_expr, parse_value};
use super::{ParseError, TokenStream};
use frm_ast::{SetValue, Setting, SettingKind, Type};
use frm_lexer::Token;

fn ends_setting_list(token: Option<&Token>) -> bool {
    matches!(
        token,
        None | Some(
            Token::RBrace
                | Token::FormId(_)
                | Token::SectStm(_)
                | Token::SectSet(_)
                | Token::SectParms(_)
                | Token::Endparam
                | Token::Endfunc
                | Token::Endheading
        )
    )
}

/// Parse settings until a section header, block end or `}`.
///
/// Several settings may share a line (`index=0 color=5153516`).
pub(super) fn parse_setting_list(stream: &mut TokenStream) -> Result<Vec<Setting>, ParseError> {
    let mut settings = Vec::new();

    loop {
        stream.skip_separators();
        if ends_setting_list(stream.peek()) {
            break;
        }
        settings.push(parse_setting(stream)?);
    }

    Ok(settings)
}

fn parse_setting(stream: &mut TokenStream) -> Result<Setting, ParseError> {
    let line = stream.line();

    match stream.peek() {
        Some(Token::TypeName(name) | Token::Ident(name))
            if matches!(stream.peek_nth(1), Some(Token::Assign)) =>
        {
            stream.advance();
            stream.advance();
            let value = parse_set_value(stream)?;
            Ok(Setting::new(
                SettingKind::Set {
                    name: name.clone(),
                    value,
                },
                line,
            ))
        }
        Some(Token::TypeName(name)) => {
            let ty = Type::from_name(name).ok_or_else(|| {
                ParseError::invalid_syntax(format!("unknown type '{}'", name), line)
            })?;
            stream.advance();
            match stream.peek() {
                Some(Token::Param | Token::Func) => parse_block(stream, Some(ty)),
                other => Err(ParseError::unexpected_token(
                    other,
                    "after type in settings",
                    stream.line(),
                )),
            }
        }
        Some(Token::Param | Token::Func) => parse_block(stream, None),
        Some(Token::Heading) => {
            stream.advance();
            let settings = parse_setting_list(stream)?;
            stream.expect(Token::Endheading)?;
            Ok(Setting::new(SettingKind::Heading { settings }, line))
        }
        other => Err(ParseError::unexpected_token(other, "in settings", line)),
    }
}

/// `param name ... endparam` or `func name ... endfunc`, the optional type
/// already consumed.
fn parse_block(stream: &mut TokenStream, ty: Option<Type>) -> Result<Setting, ParseError> {
    let line = stream.line();
    let is_param = matches!(stream.advance(), Some(Token::Param));

    let name = match stream.advance() {
        Some(Token::Ident(name)) => name.trim_start_matches('@').to_string(),
        // Parameters may reuse type and keyword spellings, e.g. `param color`.
        Some(token @ (Token::TypeName(_) | Token::Bool(_))) => token.to_string(),
        other => {
            return Err(ParseError::unexpected_token(
                other,
                if is_param { "as parameter name" } else { "as function name" },
                line,
            ));
        }
    };

    let settings = parse_setting_list(stream)?;

    let kind = if is_param {
        stream.expect(Token::Endparam)?;
        SettingKind::Param { ty, name, settings }
    } else {
        stream.expect(Token::Endfunc)?;
        SettingKind::Func { ty, name, settings }
    };
    Ok(Setting::new(kind, line))
}

/// Right-hand side of `name = value`.
fn parse_set_value(stream: &mut TokenStream) -> Result<SetValue, ParseError> {
    match stream.peek() {
        Some(Token::Str(_)) => {
            let mut strings = Vec::new();
            while let Some(Token::Str(s)) = stream.peek() {
                strings.push(s.clone());
                stream.advance();
            }
            Ok(SetValue::Strings(strings))
        }
        Some(Token::Ident(name))
            if matches!(stream.peek_nth(1), Some(Token::LParen))
                && matches!(stream.peek_nth(2), Some(Token::RParen)) =>
        {
            stream.advance();
            stream.advance();
            stream.advance();
            Ok(SetValue::FuncRef(name.clone()))
        }
        Some(Token::LBracket) => {
            stream.advance();
            let mut items = Vec::new();
            loop {
                stream.skip_separators();
                if stream.check(&Token::RBracket) {
                    stream.advance();
                    break;
                }
                items.push(parse_expr(stream)?);
            }
            Ok(SetValue::List(items))
        }
        _ => Ok(SetValue::Expr(parse_value(stream)?)),
    }
}
