//! Lexical primitives: whitespace and comments, identifiers, numbers, and
//! string literals with `${expr}` interpolation.

use crate::ast::StringSegment;
use crate::combinators::{
    any_char, describe_head, flat_map, not_followed_by, tag, ParseResult, Parser, ParserError,
};
use crate::cursor::Cursor;

/// Words that cannot be used as identifiers.
pub const RESERVED_WORDS: &[&str] = &["static", "if", "then", "else", "true", "false", "null"];

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Skip whitespace, line comments and block comments. Never fails.
pub fn skip_spaces(start: Cursor<'_>) -> ParseResult<'_, ()> {
    let mut cursor = start;
    loop {
        match cursor.head() {
            Some(' ' | '\t' | '\r' | '\n') => cursor = cursor.advance(),
            Some('/') => {
                if let Ok((next, ())) = line_comment(cursor) {
                    cursor = next;
                } else if let Ok((next, ())) = block_comment(cursor) {
                    cursor = next;
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    Ok((cursor, ()))
}

/// `// ...` to the end of the line or the end of the input.
pub fn line_comment(cursor: Cursor<'_>) -> ParseResult<'_, ()> {
    let (mut cursor, _) = tag("//")(cursor)?;
    while let Some(ch) = cursor.head() {
        if ch == '\n' {
            break;
        }
        cursor = cursor.advance();
    }
    Ok((cursor, ()))
}

/// `/* ... */`, non-greedy: consumes up to the first closer.
pub fn block_comment(cursor: Cursor<'_>) -> ParseResult<'_, ()> {
    let (cursor, _) = tag("/*")(cursor)?;
    let body = flat_map(not_followed_by(tag("*/")), |()| any_char());
    let mut cursor = cursor;
    loop {
        match body(cursor) {
            Ok((next, _)) => cursor = next,
            Err(_) => break,
        }
    }
    let (cursor, _) = tag("*/")(cursor)?;
    Ok((cursor, ()))
}

/// An identifier: a letter or underscore followed by letters, digits and
/// underscores. Reserved words are rejected.
pub fn identifier(start: Cursor<'_>) -> ParseResult<'_, String> {
    let Some(first) = start.head() else {
        return Err(ParserError::unexpected(
            start.position(),
            "identifier",
            "end of input",
        ));
    };
    if !is_ident_start(first) {
        return Err(ParserError::unexpected(
            start.position(),
            "identifier",
            describe_head(start),
        ));
    }
    let mut cursor = start.advance();
    while let Some(ch) = cursor.head() {
        if !is_ident_continue(ch) {
            break;
        }
        cursor = cursor.advance();
    }
    let text = &start.source()[start.position().index..cursor.position().index];
    if RESERVED_WORDS.contains(&text) {
        return Err(ParserError::unexpected(
            start.position(),
            "identifier",
            format!("reserved word '{text}'"),
        ));
    }
    Ok((cursor, text.to_string()))
}

/// A whole word such as `static` or `if`, not immediately followed by an
/// identifier character.
pub fn keyword<'src>(word: &'static str) -> impl Parser<'src, ()> {
    move |cursor: Cursor<'src>| {
        let (next, _) = tag(word)(cursor)?;
        if next.head().is_some_and(is_ident_continue) {
            return Err(ParserError::unexpected(
                cursor.position(),
                format!("'{word}'"),
                describe_head(cursor),
            ));
        }
        Ok((next, ()))
    }
}

/// A signed integer or decimal literal.
pub fn number(start: Cursor<'_>) -> ParseResult<'_, f64> {
    let mut cursor = start;
    if matches!(cursor.head(), Some('+' | '-')) {
        cursor = cursor.advance();
    }
    let digits_start = cursor;
    while cursor.head().is_some_and(|ch| ch.is_ascii_digit()) {
        cursor = cursor.advance();
    }
    if cursor.position().index == digits_start.position().index {
        return Err(ParserError::unexpected(
            start.position(),
            "number",
            describe_head(start),
        ));
    }
    // A fractional part only counts with digits after the dot; `1.` stays
    // an integer followed by a dot.
    if cursor.head() == Some('.') {
        let after_dot = cursor.advance();
        if after_dot.head().is_some_and(|ch| ch.is_ascii_digit()) {
            let mut frac = after_dot;
            while frac.head().is_some_and(|ch| ch.is_ascii_digit()) {
                frac = frac.advance();
            }
            cursor = frac;
        }
    }
    let text = &start.source()[start.position().index..cursor.position().index];
    let text = text.strip_prefix('+').unwrap_or(text);
    match text.parse::<f64>() {
        Ok(value) => Ok((cursor, value)),
        Err(_) => Err(ParserError::unexpected(
            start.position(),
            "number",
            format!("'{text}'"),
        )),
    }
}

/// A single- or double-quoted string literal, split into literal-text runs
/// and `${expr}` interpolation segments. `\'`, `\"`, `\$` and `\\` escape
/// the respective character.
pub fn string_literal(start: Cursor<'_>) -> ParseResult<'_, Vec<StringSegment>> {
    let quote = match start.head() {
        Some(q @ ('\'' | '"')) => q,
        _ => {
            return Err(ParserError::unexpected(
                start.position(),
                "string",
                describe_head(start),
            ))
        }
    };
    let mut cursor = start.advance();
    let mut segments = Vec::new();
    let mut text = String::new();
    loop {
        match cursor.head() {
            None => {
                return Err(ParserError::unexpected(
                    cursor.position(),
                    format!("closing {quote}"),
                    "end of input",
                ))
            }
            Some(ch) if ch == quote => {
                cursor = cursor.advance();
                break;
            }
            Some('\\') => {
                let escaped = cursor.advance();
                match escaped.head() {
                    Some(ch) if ch == quote || ch == '$' || ch == '\\' => {
                        text.push(ch);
                        cursor = escaped.advance();
                    }
                    Some(ch) => {
                        text.push('\\');
                        text.push(ch);
                        cursor = escaped.advance();
                    }
                    None => {
                        return Err(ParserError::unexpected(
                            escaped.position(),
                            "escaped character",
                            "end of input",
                        ))
                    }
                }
            }
            Some('$') if cursor.advance().head() == Some('{') => {
                if !text.is_empty() {
                    segments.push(StringSegment::Text(std::mem::take(&mut text)));
                }
                let (c, _) = skip_spaces(cursor.advance().advance())?;
                let (c, expr) = super::expressions::expression(c)?;
                let (c, _) = skip_spaces(c)?;
                let (c, _) = crate::combinators::character('}')(c)?;
                segments.push(StringSegment::Interpolation(Box::new(expr)));
                cursor = c;
            }
            Some(ch) => {
                text.push(ch);
                cursor = cursor.advance();
            }
        }
    }
    if !text.is_empty() || segments.is_empty() {
        segments.push(StringSegment::Text(text));
    }
    Ok((cursor, segments))
}
