//! Generic backtracking parser combinators.
//!
//! A parser is any `Fn(Cursor) -> ParseResult<T>`: on success it returns the
//! advanced cursor and a value, on failure a positioned [`ParserError`].
//! Everything in the grammar is composed from the small set of combinators in
//! this module.
//!
//! Two policies here carry the whole diagnostic quality of the language and
//! must not be weakened:
//!
//! - [`alternative`] resolves a two-way failure by keeping the error whose
//!   position is furthest into the input. The branch that consumed more
//!   input knows more about what went wrong. On an exact tie the second
//!   branch's error wins.
//! - [`or_recover_only`] substitutes a fallback value only for the listed
//!   error kinds. The grammar recovers from [`ErrorKind::InvalidSyntax`]
//!   (a shape check failed after a structurally valid parse) while letting
//!   [`ErrorKind::UnexpectedToken`] propagate, so postfix and operator
//!   chains stop extending cleanly without hiding real syntax errors.

use crate::cursor::{Cursor, Position, Span};
use thiserror::Error;

/// Classification of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input does not match the grammar at this point.
    UnexpectedToken,
    /// The production is recognized but not built.
    NotImplemented,
    /// The input is structurally valid but semantically ill-shaped, for
    /// example a call applied to a number literal. Drives selective
    /// recovery in [`or_recover_only`].
    InvalidSyntax,
}

/// A positioned parse failure.
#[derive(Debug, Clone, Error)]
#[error("{message} at {}:{}", .position.row, .position.column)]
pub struct ParserError {
    pub kind: ErrorKind,
    pub position: Position,
    pub message: String,
    pub expect: Option<String>,
    pub actual: Option<String>,
    pub cause: Option<Box<ParserError>>,
}

impl ParserError {
    /// Grammar mismatch with the standard "Expect X but got Y" message.
    pub fn unexpected(position: Position, expect: impl Into<String>, actual: impl Into<String>) -> Self {
        let expect = expect.into();
        let actual = actual.into();
        Self {
            kind: ErrorKind::UnexpectedToken,
            position,
            message: format!("Expect {expect} but got {actual}"),
            expect: Some(expect),
            actual: Some(actual),
            cause: None,
        }
    }

    /// A semantically ill-shaped construct, recoverable via
    /// [`or_recover_only`].
    pub fn invalid(position: Position, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidSyntax,
            position,
            message: message.into(),
            expect: None,
            actual: None,
            cause: None,
        }
    }

    /// A recognized but unbuilt production.
    pub fn not_implemented(position: Position, what: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotImplemented,
            position,
            message: format!("Not implemented: {}", what.into()),
            expect: None,
            actual: None,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: ParserError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Result of running a parser: the advanced cursor and the value, or a
/// positioned error.
pub type ParseResult<'src, T> = Result<(Cursor<'src>, T), ParserError>;

/// Any `Fn(Cursor) -> ParseResult<T>` is a parser.
pub trait Parser<'src, T>: Fn(Cursor<'src>) -> ParseResult<'src, T> {}

impl<'src, T, F> Parser<'src, T> for F where F: Fn(Cursor<'src>) -> ParseResult<'src, T> {}

/// Describe the character under the cursor for error messages.
pub fn describe_head(cursor: Cursor<'_>) -> String {
    match cursor.head() {
        Some('\n') => "end of line".to_string(),
        Some(ch) => format!("'{ch}'"),
        None => "end of input".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Core combinators
// ---------------------------------------------------------------------------

/// Transform the value of a successful parse.
pub fn map<'src, T, U>(parser: impl Parser<'src, T>, f: impl Fn(T) -> U) -> impl Parser<'src, U> {
    move |cursor| parser(cursor).map(|(next, value)| (next, f(value)))
}

/// Sequence a parser with a continuation that builds the next parser from
/// the value. The cursor only advances along the success path.
pub fn flat_map<'src, T, U, P, Q, F>(parser: P, f: F) -> impl Parser<'src, U>
where
    P: Parser<'src, T>,
    Q: Parser<'src, U>,
    F: Fn(T) -> Q,
{
    move |cursor| {
        let (next, value) = parser(cursor)?;
        f(value)(next)
    }
}

/// Try `first`; on failure, try `second` from the original cursor.
///
/// If both fail, keep the failure that reached further into the input. On an
/// exact tie the second failure wins.
pub fn alternative<'src, T>(
    first: impl Parser<'src, T>,
    second: impl Parser<'src, T>,
) -> impl Parser<'src, T> {
    move |cursor| match first(cursor) {
        ok @ Ok(_) => ok,
        Err(first_err) => match second(cursor) {
            ok @ Ok(_) => ok,
            Err(second_err) => {
                if first_err.position.index > second_err.position.index {
                    Err(first_err)
                } else {
                    Err(second_err)
                }
            }
        },
    }
}

/// Fold a list of parsers with [`alternative`].
macro_rules! alt {
    ($first:expr $(,)?) => { $first };
    ($first:expr, $($rest:expr),+ $(,)?) => {
        $crate::combinators::alternative($first, alt!($($rest),+))
    };
}
pub(crate) use alt;

/// Wrap the value in `Some`; on failure, succeed with `None` without
/// consuming input.
pub fn optional<'src, T>(parser: impl Parser<'src, T>) -> impl Parser<'src, Option<T>> {
    move |cursor| match parser(cursor) {
        Ok((next, value)) => Ok((next, Some(value))),
        Err(_) => Ok((cursor, None)),
    }
}

/// Succeed, consuming nothing, exactly when `parser` fails here.
pub fn not_followed_by<'src, T>(parser: impl Parser<'src, T>) -> impl Parser<'src, ()> {
    move |cursor| match parser(cursor) {
        Ok(_) => Err(ParserError::unexpected(
            cursor.position(),
            "something else",
            describe_head(cursor),
        )),
        Err(_) => Ok((cursor, ())),
    }
}

/// Apply `step` repeatedly, feeding the accumulated state back in, until the
/// first failing attempt. The cursor is rolled back to just before that
/// attempt and the accumulated state is returned.
///
/// The loop is explicitly iterative so arbitrarily long input cannot
/// overflow the call stack. A step that succeeds without consuming input
/// ends the loop; it would otherwise never terminate.
pub fn repeat<'src, S, I, F>(init: I, step: F) -> impl Parser<'src, S>
where
    I: Fn() -> S,
    F: Fn(&S, Cursor<'src>) -> ParseResult<'src, S>,
{
    move |start: Cursor<'src>| {
        let mut cursor = start;
        let mut state = init();
        loop {
            match step(&state, cursor) {
                Ok((next, folded)) => {
                    if next.position().index == cursor.position().index {
                        return Ok((next, folded));
                    }
                    state = folded;
                    cursor = next;
                }
                Err(_) => return Ok((cursor, state)),
            }
        }
    }
}

/// Like [`repeat`], but the first step must succeed.
pub fn repeat1<'src, S, I, F>(init: I, step: F) -> impl Parser<'src, S>
where
    I: Fn() -> S,
    F: Fn(&S, Cursor<'src>) -> ParseResult<'src, S>,
{
    move |start: Cursor<'src>| {
        let seed = init();
        let (mut cursor, mut state) = step(&seed, start)?;
        loop {
            match step(&state, cursor) {
                Ok((next, folded)) => {
                    if next.position().index == cursor.position().index {
                        return Ok((next, folded));
                    }
                    state = folded;
                    cursor = next;
                }
                Err(_) => return Ok((cursor, state)),
            }
        }
    }
}

/// Zero or more `item`s into a `Vec`.
pub fn many0<'src, T: Clone>(item: impl Parser<'src, T>) -> impl Parser<'src, Vec<T>> {
    repeat(Vec::new, move |acc: &Vec<T>, cursor| {
        let (next, value) = item(cursor)?;
        let mut items = acc.clone();
        items.push(value);
        Ok((next, items))
    })
}

/// One or more `item`s into a `Vec`.
pub fn many1<'src, T>(item: impl Parser<'src, T>) -> impl Parser<'src, Vec<T>> {
    move |cursor| {
        let (mut cursor, first) = item(cursor)?;
        let mut items = vec![first];
        loop {
            match item(cursor) {
                Ok((next, value)) => {
                    if next.position().index == cursor.position().index {
                        return Ok((next, items));
                    }
                    items.push(value);
                    cursor = next;
                }
                Err(_) => return Ok((cursor, items)),
            }
        }
    }
}

/// Zero or more `item`s separated by `separator`. A separator with no item
/// after it is left unconsumed.
pub fn sep_by<'src, T, S>(
    item: impl Parser<'src, T>,
    separator: impl Parser<'src, S>,
) -> impl Parser<'src, Vec<T>> {
    move |start: Cursor<'src>| {
        let (mut cursor, first) = match item(start) {
            Ok(hit) => hit,
            Err(_) => return Ok((start, Vec::new())),
        };
        let mut items = vec![first];
        loop {
            let after_sep = match separator(cursor) {
                Ok((next, _)) => next,
                Err(_) => return Ok((cursor, items)),
            };
            match item(after_sep) {
                Ok((next, value)) => {
                    items.push(value);
                    cursor = next;
                }
                Err(_) => return Ok((cursor, items)),
            }
        }
    }
}

/// One or more `item`s separated by `separator`.
pub fn sep_by1<'src, T, S>(
    item: impl Parser<'src, T>,
    separator: impl Parser<'src, S>,
) -> impl Parser<'src, Vec<T>> {
    move |start: Cursor<'src>| {
        let (mut cursor, first) = item(start)?;
        let mut items = vec![first];
        loop {
            let after_sep = match separator(cursor) {
                Ok((next, _)) => next,
                Err(_) => return Ok((cursor, items)),
            };
            match item(after_sep) {
                Ok((next, value)) => {
                    items.push(value);
                    cursor = next;
                }
                Err(_) => return Ok((cursor, items)),
            }
        }
    }
}

/// Zero or more `separator item` pairs, keeping the items.
pub fn start_by<'src, T, S>(
    separator: impl Parser<'src, S>,
    item: impl Parser<'src, T>,
) -> impl Parser<'src, Vec<T>> {
    move |start: Cursor<'src>| {
        let mut cursor = start;
        let mut items = Vec::new();
        loop {
            let after_sep = match separator(cursor) {
                Ok((next, _)) => next,
                Err(_) => return Ok((cursor, items)),
            };
            match item(after_sep) {
                Ok((next, value)) => {
                    items.push(value);
                    cursor = next;
                }
                Err(_) => return Ok((cursor, items)),
            }
        }
    }
}

/// Record the source range consumed by `parser` alongside its value.
pub fn with_span<'src, T>(parser: impl Parser<'src, T>) -> impl Parser<'src, (T, Span)> {
    move |cursor: Cursor<'src>| {
        let start = cursor.position();
        let (next, value) = parser(cursor)?;
        Ok((next, (value, Span::new(start, next.position()))))
    }
}

/// Run `parser`; if it fails with one of the listed kinds, succeed with
/// `fallback` and the original cursor. Any other failure propagates.
pub fn or_recover_only<'src, T: Clone>(
    kinds: &'static [ErrorKind],
    parser: impl Parser<'src, T>,
    fallback: T,
) -> impl Parser<'src, T> {
    move |cursor| match parser(cursor) {
        ok @ Ok(_) => ok,
        Err(err) if kinds.contains(&err.kind) => Ok((cursor, fallback.clone())),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Character-level primitives
// ---------------------------------------------------------------------------

/// Any single code point.
pub fn any_char<'src>() -> impl Parser<'src, char> {
    move |cursor: Cursor<'src>| match cursor.head() {
        Some(ch) => Ok((cursor.advance(), ch)),
        None => Err(ParserError::unexpected(
            cursor.position(),
            "any character",
            "end of input",
        )),
    }
}

/// A single code point matching `predicate`; `expect` names it in errors.
pub fn satisfy<'src>(
    predicate: impl Fn(char) -> bool,
    expect: &'static str,
) -> impl Parser<'src, char> {
    move |cursor: Cursor<'src>| match cursor.head() {
        Some(ch) if predicate(ch) => Ok((cursor.advance(), ch)),
        _ => Err(ParserError::unexpected(
            cursor.position(),
            expect,
            describe_head(cursor),
        )),
    }
}

/// Exactly the character `expected`.
pub fn character<'src>(expected: char) -> impl Parser<'src, char> {
    move |cursor: Cursor<'src>| match cursor.head() {
        Some(ch) if ch == expected => Ok((cursor.advance(), ch)),
        _ => Err(ParserError::unexpected(
            cursor.position(),
            format!("'{expected}'"),
            describe_head(cursor),
        )),
    }
}

/// Any one character out of `set`.
pub fn one_of<'src>(set: &'static str) -> impl Parser<'src, char> {
    move |cursor: Cursor<'src>| match cursor.head() {
        Some(ch) if set.contains(ch) => Ok((cursor.advance(), ch)),
        _ => Err(ParserError::unexpected(
            cursor.position(),
            format!("one of {set:?}"),
            describe_head(cursor),
        )),
    }
}

/// Exactly the string `expected`.
pub fn tag<'src>(expected: &'static str) -> impl Parser<'src, &'static str> {
    move |cursor: Cursor<'src>| {
        let mut current = cursor;
        for want in expected.chars() {
            match current.head() {
                Some(ch) if ch == want => current = current.advance(),
                _ => {
                    return Err(ParserError::unexpected(
                        cursor.position(),
                        format!("'{expected}'"),
                        describe_head(cursor),
                    ))
                }
            }
        }
        Ok((current, expected))
    }
}

/// End of input.
pub fn end_of_input<'src>() -> impl Parser<'src, ()> {
    move |cursor: Cursor<'src>| {
        if cursor.is_end() {
            Ok((cursor, ()))
        } else {
            Err(ParserError::unexpected(
                cursor.position(),
                "end of input",
                describe_head(cursor),
            ))
        }
    }
}
