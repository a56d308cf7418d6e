//! Parser for FlowScript source code.
//!
//! The grammar is built directly on the combinator engine; there is no
//! separate token stream. [`parse`] turns a source string into a
//! [`Spanned<Graph>`]: an ordered statement list with the optional file-level
//! `@version("...")` annotation attached to the graph node.
//!
//! # Usage
//!
//! ```rust
//! use flowscript::parser::parse;
//!
//! let graph = parse("static a = 1;\nb = identity({x: a});").unwrap();
//! assert_eq!(graph.node.statements.len(), 2);
//! ```
//!
//! Statements come in three forms, each terminated by `;` and optionally
//! preceded by `@name(value)` annotations:
//!
//! ```text
//! static name = expr;    immutable binding
//! name = expr;           named computed node
//! expr;                  anonymous computed node
//! ```

mod expressions;
mod primitives;

pub(crate) use expressions::expression;
pub use primitives::RESERVED_WORDS;

use crate::ast::{Annotation, Graph, Spanned, Statement};
use crate::combinators::{
    alt, character, many0, not_followed_by, with_span, ParseResult, ParserError,
};
use crate::cursor::{Cursor, Span};

use expressions::annotation;
use primitives::{identifier, keyword, skip_spaces};

/// Parse a FlowScript file into a graph.
///
/// The returned [`Spanned`] carries any file-level annotations (such as
/// `@version("0.6");`) in its annotation list.
pub fn parse(source: &str) -> Result<Spanned<Graph>, ParserError> {
    let cursor = Cursor::new(source);
    let (c, ()) = skip_spaces(cursor)?;
    let start = c.position();
    let (c, file_annotations) = many0(file_annotation)(c)?;

    let (mut c, first) = statement(c)?;
    let mut statements = vec![first];
    loop {
        let (after_ws, ()) = skip_spaces(c)?;
        if after_ws.is_end() {
            c = after_ws;
            break;
        }
        let (next, stmt) = statement(after_ws)?;
        statements.push(stmt);
        c = next;
    }

    Ok(Spanned::with_annotations(
        Graph { statements },
        Span::new(start, c.position()),
        file_annotations,
    ))
}

/// A file-level annotation statement: `@name(value);` with no node after
/// the annotation.
fn file_annotation(cursor: Cursor<'_>) -> ParseResult<'_, Annotation> {
    let (c, ann) = annotation(cursor)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(';')(c)?;
    let (c, ()) = skip_spaces(c)?;
    Ok((c, ann))
}

/// A single `;`-terminated statement with its annotations.
pub(crate) fn statement(cursor: Cursor<'_>) -> ParseResult<'_, Spanned<Statement>> {
    let (c, ()) = skip_spaces(cursor)?;
    let start = c.position();
    let (c, annotations) = many0(annotation_padded)(c)?;
    let (c, stmt) = alt!(static_statement, named_statement, anonymous_statement)(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, _) = character(';')(c)?;
    Ok((
        c,
        Spanned::with_annotations(stmt, Span::new(start, c.position()), annotations),
    ))
}

fn annotation_padded(cursor: Cursor<'_>) -> ParseResult<'_, Annotation> {
    let (c, ann) = annotation(cursor)?;
    let (c, ()) = skip_spaces(c)?;
    Ok((c, ann))
}

/// `=` that is an assignment, not the first half of `==`.
fn assign(cursor: Cursor<'_>) -> ParseResult<'_, ()> {
    let (c, _) = character('=')(cursor)?;
    let (c, ()) = not_followed_by(character('='))(c)?;
    Ok((c, ()))
}

fn static_statement(cursor: Cursor<'_>) -> ParseResult<'_, Statement> {
    let (c, ()) = keyword("static")(cursor)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, (name, name_span)) = with_span(identifier)(c)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, ()) = assign(c)?;
    let (c, value) = expression(c)?;
    Ok((
        c,
        Statement::Static {
            name: Spanned::new(name, name_span),
            value,
        },
    ))
}

fn named_statement(cursor: Cursor<'_>) -> ParseResult<'_, Statement> {
    let (c, (name, name_span)) = with_span(identifier)(cursor)?;
    let (c, ()) = skip_spaces(c)?;
    let (c, ()) = assign(c)?;
    let (c, body) = expression(c)?;
    Ok((
        c,
        Statement::Computed {
            name: Some(Spanned::new(name, name_span)),
            body,
        },
    ))
}

fn anonymous_statement(cursor: Cursor<'_>) -> ParseResult<'_, Statement> {
    let (c, body) = expression(cursor)?;
    Ok((c, Statement::Computed { name: None, body }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    #[test]
    fn file_with_static_and_computed_statements() {
        let graph = parse("static a = 1;\nb = identity({x: a});").unwrap();
        let statements = &graph.node.statements;
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].node, Statement::Static { .. }));
        match &statements[1].node {
            Statement::Computed { name, .. } => {
                assert_eq!(name.as_ref().unwrap().node, "b");
            }
            other => panic!("expected computed statement, got {other:?}"),
        }
    }

    #[test]
    fn anonymous_trailing_expression() {
        let graph = parse("a = 1;\na + 1;").unwrap();
        match &graph.node.statements[1].node {
            Statement::Computed { name, body } => {
                assert!(name.is_none());
                assert!(matches!(body.node, Expr::Binary { .. }));
            }
            other => panic!("expected computed statement, got {other:?}"),
        }
    }

    #[test]
    fn version_annotation_attaches_to_the_graph() {
        let graph = parse("@version(\"0.6\");\na = identity(1);").unwrap();
        assert_eq!(graph.annotations.len(), 1);
        assert_eq!(graph.annotations[0].name, "version");
        assert_eq!(graph.node.statements.len(), 1);
    }

    #[test]
    fn statement_annotations_attach_to_the_statement() {
        let graph = parse("@isResult(true) a = identity(1);").unwrap();
        let stmt = &graph.node.statements[0];
        assert_eq!(stmt.annotations.len(), 1);
        assert_eq!(stmt.annotations[0].name, "isResult");
    }

    #[test]
    fn equality_is_not_an_assignment() {
        let graph = parse("a = 1;\na == 1;").unwrap();
        match &graph.node.statements[1].node {
            Statement::Computed { name, body } => {
                assert!(name.is_none(), "a == 1 is a comparison, not a binding");
                assert!(matches!(body.node, Expr::Binary { .. }));
            }
            other => panic!("expected computed statement, got {other:?}"),
        }
    }

    #[test]
    fn comments_are_skipped_between_statements() {
        let source = "// leading\nstatic a = 1; /* inline */ b = identity(a);";
        let graph = parse(source).unwrap();
        assert_eq!(graph.node.statements.len(), 2);
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let err = parse("a = 1").unwrap_err();
        assert_eq!(err.position.index, 5);
        assert!(err.message.contains("';'"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse("").is_err());
        assert!(parse("   \n  ").is_err());
    }

    #[test]
    fn trailing_garbage_fails_inside_the_statement() {
        let err = parse("a = 1; %%").unwrap_err();
        assert!(err.position.index >= 7);
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = "static a = 1;\nb = identity({x: a, y: [1, 2]});\n";
        let first = parse(source).unwrap();
        let second = parse(source).unwrap();
        assert_eq!(first, second);
    }
}
