//! The expression grammar: literals, containers, postfix chains, the binary
//! operator ladder, conditionals and lambdas.
//!
//! Each ladder level parses the next-tighter level and then greedily
//! left-folds `(operator, operand)` pairs, so `1 - 2 - 3` builds
//! `(1 - 2) - 3`. Postfix applications (call, index, member) are validated
//! against the shape of their base; an ill-shaped combination raises
//! `InvalidSyntax`, which stops the chain without consuming input, while a
//! structural error inside an application (say, a bad call argument) still
//! fails the whole chain.

use crate::ast::{Annotation, BinOp, Expr, Graph, Spanned, StringSegment};
use crate::combinators::{
    alt, alternative, character, describe_head, map, optional, or_recover_only, repeat, sep_by,
    tag, with_span, ErrorKind, ParseResult, Parser, ParserError,
};
use crate::cursor::{Cursor, Position, Span};

use super::primitives::{identifier, keyword, number, skip_spaces, string_literal};

const SOFT: &[ErrorKind] = &[ErrorKind::InvalidSyntax];

/// Parse a full expression: a conditional, a lambda, or an operator chain.
/// Leading whitespace is skipped.
pub(crate) fn expression(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let (cursor, ()) = skip_spaces(cursor)?;
    alt!(if_expression, lambda, pipeline_level)(cursor)
}

// ---------------------------------------------------------------------------
// Conditional and lambda forms
// ---------------------------------------------------------------------------

fn if_expression(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let start = cursor.position();
    let (c, ()) = keyword("if")(cursor)?;
    let (c, condition) = expression(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, ()) = keyword("then")(c)?;
    let (c, then_branch) = expression(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, ()) = keyword("else")(c)?;
    let (c, else_branch) = expression(c)?;
    let span = Span::new(start, c.position());
    Ok((
        c,
        Spanned::new(
            Expr::IfThenElse {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ),
    ))
}

fn lambda(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let start = cursor.position();
    let (c, _) = character('(')(cursor)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, param) = optional(map(with_span(identifier), |(name, span)| {
        Spanned::new(name, span)
    }))(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(')')(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = tag("->")(c)?;
    let (c, body) = expression(c)?;
    let span = Span::new(start, c.position());
    Ok((
        c,
        Spanned::new(
            Expr::AgentDef {
                param,
                body: Box::new(body),
            },
            span,
        ),
    ))
}

// ---------------------------------------------------------------------------
// Binary operator ladder, tightest to loosest
// ---------------------------------------------------------------------------

const POWER_OPS: &[BinOp] = &[BinOp::Pow];
const MUL_OPS: &[BinOp] = &[BinOp::Mul, BinOp::Div, BinOp::Mod];
const ADD_OPS: &[BinOp] = &[BinOp::Add, BinOp::Sub];
// Two-character symbols come first so `<=` is not read as `<` `=`.
const REL_OPS: &[BinOp] = &[BinOp::Le, BinOp::Ge, BinOp::Lt, BinOp::Gt];
const EQ_OPS: &[BinOp] = &[BinOp::Eq, BinOp::Ne];
const LOGIC_OPS: &[BinOp] = &[BinOp::And, BinOp::Or];
// `>>=` and `>>-` must be tried before `>>`.
const PIPE_OPS: &[BinOp] = &[
    BinOp::Pipe,
    BinOp::Chain,
    BinOp::Bind,
    BinOp::MapPipe,
    BinOp::Compose,
    BinOp::Forward,
    BinOp::Inject,
];

fn power_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, POWER_OPS, postfix_chain)
}

fn multiplicative_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, MUL_OPS, power_level)
}

fn additive_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, ADD_OPS, multiplicative_level)
}

fn relational_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, REL_OPS, additive_level)
}

fn equality_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, EQ_OPS, relational_level)
}

fn logical_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, LOGIC_OPS, equality_level)
}

fn pipeline_level(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    binary_level(cursor, PIPE_OPS, logical_level)
}

/// One ladder level: parse the next-tighter level, then left-fold
/// `(operator, operand)` pairs. A failing fold attempt, including an
/// ill-shaped operand, rolls back to just before the operator and ends the
/// level.
fn binary_level<'src>(
    cursor: Cursor<'src>,
    ops: &'static [BinOp],
    next: fn(Cursor<'src>) -> ParseResult<'src, Spanned<Expr>>,
) -> ParseResult<'src, Spanned<Expr>> {
    let (cursor, first) = next(cursor)?;
    repeat(
        move || first.clone(),
        move |acc: &Spanned<Expr>, cur: Cursor<'src>| {
            let (c, ()) = skip_spaces(cur)?;
            let (c, op) = level_operator(ops)(c)?;
            let (c, ()) = skip_spaces(c)?;
            let (c, rhs) = next(c)?;
            check_operand(op, acc)?;
            check_operand(op, &rhs)?;
            let span = acc.span.to(rhs.span);
            Ok((
                c,
                Spanned::new(
                    Expr::Binary {
                        op,
                        left: Box::new(acc.clone()),
                        right: Box::new(rhs),
                    },
                    span,
                ),
            ))
        },
    )(cursor)
}

fn level_operator<'src>(ops: &'static [BinOp]) -> impl Parser<'src, BinOp> {
    move |cursor: Cursor<'src>| {
        for &op in ops {
            if let Ok((next, _)) = tag(op.symbol())(cursor) {
                return Ok((next, op));
            }
        }
        Err(ParserError::unexpected(
            cursor.position(),
            "an operator",
            describe_head(cursor),
        ))
    }
}

/// Conditionals and lambdas are not value-shaped operands; they must be
/// parenthesized to take part in an operator chain.
fn check_operand(op: BinOp, operand: &Spanned<Expr>) -> Result<(), ParserError> {
    match operand.node {
        Expr::IfThenElse { .. } | Expr::AgentDef { .. } => Err(ParserError::invalid(
            operand.span.start,
            format!("operand of '{}' must be a value expression", op.symbol()),
        )),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Postfix chain: call, index, member
// ---------------------------------------------------------------------------

/// A term followed by any run of `(...)`, `[...]` and `.name` applications.
pub(crate) fn postfix_chain(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let (mut cursor, mut node) = term(cursor)?;
    loop {
        let (after_ws, ()) = skip_spaces(cursor)?;
        let outcome = {
            let attempt = map(|c| extend_postfix(&node, c), Some);
            or_recover_only(SOFT, attempt, None)(after_ws)
        };
        match outcome {
            Ok((next, Some(extended))) => {
                node = extended;
                cursor = next;
            }
            // The base shape made the application illegal: keep what was
            // built and leave the token for an outer production.
            Ok((_, None)) => break,
            Err(err) => {
                if err.position.index > after_ws.position().index {
                    return Err(err);
                }
                break;
            }
        }
    }
    Ok((cursor, node))
}

fn extend_postfix<'src>(
    base: &Spanned<Expr>,
    cursor: Cursor<'src>,
) -> ParseResult<'src, Spanned<Expr>> {
    alternative(
        |c| agent_call(base, c),
        alternative(|c| array_index(base, c), |c| member_access(base, c)),
    )(cursor)
}

fn agent_call<'src>(base: &Spanned<Expr>, cursor: Cursor<'src>) -> ParseResult<'src, Spanned<Expr>> {
    let (c, _) = character('(')(cursor)?;
    check_postfix_base(base, c.position(), "called as an agent")?;
    let (c, ()) = skip_spaces(c)?;
    let (c, arg) = match character(')')(c) {
        Ok((next, _)) => (next, None),
        Err(_) => {
            let (c, arg) = expression(c)?;
            let (c, ()) = skip_spaces(c)?;
            let (c, _) = character(')')(c)?;
            (c, Some(arg))
        }
    };
    let span = Span::new(base.span.start, c.position());
    Ok((
        c,
        Spanned::new(
            Expr::AgentCall {
                agent: Box::new(base.clone()),
                arg: arg.map(Box::new),
            },
            span,
        ),
    ))
}

fn array_index<'src>(base: &Spanned<Expr>, cursor: Cursor<'src>) -> ParseResult<'src, Spanned<Expr>> {
    let (c, _) = character('[')(cursor)?;
    check_indexable(base, c.position())?;
    let (c, index) = expression(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(']')(c)?;
    let span = Span::new(base.span.start, c.position());
    Ok((
        c,
        Spanned::new(
            Expr::ArrayAt {
                array: Box::new(base.clone()),
                index: Box::new(index),
            },
            span,
        ),
    ))
}

fn member_access<'src>(
    base: &Spanned<Expr>,
    cursor: Cursor<'src>,
) -> ParseResult<'src, Spanned<Expr>> {
    let (c, _) = character('.')(cursor)?;
    check_memberable(base, c.position())?;
    let (c, ()) = skip_spaces(c)?;
    let (c, (member, member_span)) = with_span(identifier)(c)?;
    let span = Span::new(base.span.start, c.position());
    Ok((
        c,
        Spanned::new(
            Expr::ObjectMember {
                object: Box::new(base.clone()),
                member: Spanned::new(member, member_span),
            },
            span,
        ),
    ))
}

fn is_postfix_result(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::AgentCall { .. } | Expr::ArrayAt { .. } | Expr::ObjectMember { .. }
    )
}

// The failure position sits just past the consumed postfix token so this
// classified error outranks the sibling token mismatches in `alternative`
// and reaches `or_recover_only`.
fn check_postfix_base(base: &Spanned<Expr>, at: Position, action: &str) -> Result<(), ParserError> {
    match &base.node {
        Expr::Identifier(_) | Expr::Paren(_) => Ok(()),
        node if is_postfix_result(node) => Ok(()),
        _ => Err(ParserError::invalid(
            at,
            format!("this expression can not be {action}"),
        )),
    }
}

fn check_indexable(base: &Spanned<Expr>, at: Position) -> Result<(), ParserError> {
    match &base.node {
        Expr::Array(_) => Ok(()),
        _ => check_postfix_base(base, at, "indexed"),
    }
}

fn check_memberable(base: &Spanned<Expr>, at: Position) -> Result<(), ParserError> {
    match &base.node {
        Expr::Object(_) => Ok(()),
        _ => check_postfix_base(base, at, "accessed as an object"),
    }
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

fn term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    alt!(
        number_term,
        string_term,
        boolean_term,
        null_term,
        array_term,
        braces_term,
        identifier_term,
        paren_term,
    )(cursor)
}

fn number_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let (c, (value, span)) = with_span(number)(cursor)?;
    Ok((c, Spanned::new(Expr::Number(value), span)))
}

fn string_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let (c, (segments, span)) = with_span(string_literal)(cursor)?;
    let interpolated = segments
        .iter()
        .any(|s| matches!(s, StringSegment::Interpolation(_)));
    let node = if interpolated {
        Expr::InterpolatedString(segments)
    } else {
        let text = segments
            .into_iter()
            .map(|s| match s {
                StringSegment::Text(t) => t,
                StringSegment::Interpolation(_) => unreachable!(),
            })
            .collect::<String>();
        Expr::RawString(text)
    };
    Ok((c, Spanned::new(node, span)))
}

fn boolean_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let true_term = map(with_span(keyword("true")), |((), span)| {
        Spanned::new(Expr::Boolean(true), span)
    });
    let false_term = map(with_span(keyword("false")), |((), span)| {
        Spanned::new(Expr::Boolean(false), span)
    });
    alternative(true_term, false_term)(cursor)
}

fn null_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let (c, ((), span)) = with_span(keyword("null"))(cursor)?;
    Ok((c, Spanned::new(Expr::Null, span)))
}

fn identifier_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let (c, (name, span)) = with_span(identifier)(cursor)?;
    Ok((c, Spanned::new(Expr::Identifier(name), span)))
}

fn paren_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let start = cursor.position();
    let (c, _) = character('(')(cursor)?;
    let (c, inner) = expression(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(')')(c)?;
    let span = Span::new(start, c.position());
    Ok((c, Spanned::new(Expr::Paren(Box::new(inner)), span)))
}

fn array_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let start = cursor.position();
    let (c, _) = character('[')(cursor)?;
    let element = |c| {
        let (c, value) = expression(c)?;
        let (c, ()) = skip_spaces(c)?;
        Ok((c, value))
    };
    let (c, items) = sep_by(element, character(','))(c)?;
    let (c, _) = optional(character(','))(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(']')(c)?;
    let span = Span::new(start, c.position());
    Ok((c, Spanned::new(Expr::Array(items), span)))
}

/// `{ ... }` is an object literal when its entries are `key: value` pairs,
/// otherwise a nested graph block.
fn braces_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    alternative(object_term, graph_term)(cursor)
}

fn object_key(cursor: Cursor<'_>) -> ParseResult<'_, String> {
    let string_key = |c| {
        let (c, segments) = string_literal(c)?;
        let mut text = String::new();
        for segment in segments {
            match segment {
                StringSegment::Text(t) => text.push_str(&t),
                StringSegment::Interpolation(expr) => {
                    return Err(ParserError::invalid(
                        expr.span.start,
                        "object keys can not be interpolated",
                    ))
                }
            }
        }
        Ok((c, text))
    };
    alternative(identifier, string_key)(cursor)
}

fn object_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let start = cursor.position();
    let (c, _) = character('{')(cursor)?;
    let pair = |c| {
        let (c, ()) = skip_spaces(c)?;
        let (c, key) = object_key(c)?;
        let (c, ()) = skip_spaces(c)?;
        let (c, _) = character(':')(c)?;
        let (c, value) = expression(c)?;
        let (c, ()) = skip_spaces(c)?;
        Ok((c, (key, value)))
    };
    let (c, pairs) = sep_by(pair, character(','))(c)?;
    let (c, _) = optional(character(','))(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character('}')(c)?;
    let span = Span::new(start, c.position());
    Ok((
        c,
        Spanned::new(Expr::Object(pairs.into_iter().collect()), span),
    ))
}

fn graph_term(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Expr>> {
    let start = cursor.position();
    let (c, _) = character('{')(cursor)?;
    let (mut c, first) = super::statement(c)?;
    let mut statements = vec![first];
    loop {
        let (after_ws, ()) = skip_spaces(c)?;
        if after_ws.head() == Some('}') {
            c = after_ws.advance();
            break;
        }
        let (next, stmt) = super::statement(after_ws)?;
        statements.push(stmt);
        c = next;
    }
    let span = Span::new(start, c.position());
    Ok((c, Spanned::new(Expr::NestedGraph(Graph { statements }), span)))
}

// ---------------------------------------------------------------------------
// Annotations (shared with the statement grammar)
// ---------------------------------------------------------------------------

/// `@name(value)`.
pub(crate) fn annotation(cursor: Cursor<'_>) -> ParseResult<'_, Annotation> {
    let start = cursor.position();
    let (c, _) = character('@')(cursor)?;
    let (c, name) = identifier(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character('(')(c)?;
    let (c, value) = expression(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(')')(c)?;
    Ok((
        c,
        Annotation {
            name,
            value,
            span: Span::new(start, c.position()),
        },
    ))
}
