//! Error types and diagnostics.
//!
//! Both stages surface failures as typed values: the parser as a single
//! positioned [`ParserError`], the compiler as a [`CompileError`] carrying
//! one or more located items. [`diagnostics`] reduces either category to
//! the same flat record shape; [`ErrorReporter`] renders the records with
//! [ariadne](https://crates.io/crates/ariadne) for terminal output.
//!
//! ```rust
//! use flowscript::{compile, diagnostics, AgentRegistry};
//!
//! let source = "a = identity({x: missing});";
//! let registry = AgentRegistry::from_names(["identity"]);
//! let error = compile(source, &registry).unwrap_err();
//! let records = diagnostics("example.flow", source, &error);
//! assert_eq!(records[0].message, "Identifier not found: missing");
//! ```

use ariadne::{Color, Label, Report, ReportKind, Source};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::combinators::ParserError;
use crate::cursor::Span;

/// One located compiler failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileErrorItem {
    pub message: String,
    pub span: Span,
}

/// A semantic lowering failure. Annotation checking can report several
/// items at once; everything else short-circuits with a single item.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub items: Vec<CompileErrorItem>,
}

impl CompileError {
    pub fn new(items: Vec<CompileErrorItem>) -> Self {
        Self { items }
    }

    pub fn single(message: impl Into<String>, span: Span) -> Self {
        Self {
            items: vec![CompileErrorItem {
                message: message.into(),
                span,
            }],
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for item in &self.items {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", item.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Any failure produced by the front end.
#[derive(Debug, Clone, Error)]
pub enum LangError {
    #[error("{0}")]
    Parse(#[from] ParserError),
    #[error("{0}")]
    Compile(#[from] CompileError),
}

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Parse,
    Compile,
}

/// A 1-based row/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineCol {
    pub row: u32,
    pub column: u32,
}

/// One normalized, display-ready record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: String,
    pub start: LineCol,
    pub end: LineCol,
    pub message: String,
    /// The full source line containing the failure.
    pub line: String,
}

/// Reduce an error to normalized records: exactly one for a parser error,
/// one per item for a compiler error.
pub fn diagnostics(path: &str, source: &str, error: &LangError) -> Vec<Diagnostic> {
    match error {
        LangError::Parse(err) => vec![Diagnostic {
            kind: DiagnosticKind::Parse,
            path: path.to_string(),
            start: LineCol {
                row: err.position.row,
                column: err.position.column,
            },
            end: LineCol {
                row: err.position.row,
                column: err.position.column + 1,
            },
            message: err.message.clone(),
            line: line_at(source, err.position.index),
        }],
        LangError::Compile(err) => err
            .items
            .iter()
            .map(|item| Diagnostic {
                kind: DiagnosticKind::Compile,
                path: path.to_string(),
                start: LineCol {
                    row: item.span.start.row,
                    column: item.span.start.column,
                },
                end: LineCol {
                    row: item.span.end.row,
                    column: item.span.end.column,
                },
                message: item.message.clone(),
                line: line_at(source, item.span.start.index),
            })
            .collect(),
    }
}

/// The source line around `index`, found by scanning to the nearest line
/// boundaries.
fn line_at(source: &str, index: usize) -> String {
    let index = index.min(source.len());
    let start = source[..index].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = source[index..]
        .find('\n')
        .map(|i| index + i)
        .unwrap_or(source.len());
    source[start..end].to_string()
}

/// Pretty terminal reporting on top of [`diagnostics`].
pub struct ErrorReporter<'src> {
    source_name: String,
    source: &'src str,
}

impl<'src> ErrorReporter<'src> {
    pub fn new(source_name: impl Into<String>, source: &'src str) -> Self {
        Self {
            source_name: source_name.into(),
            source,
        }
    }

    /// Report every record of `error` to stderr.
    pub fn report(&self, error: &LangError) {
        match error {
            LangError::Parse(err) => {
                let at = err.position.index.min(self.source.len());
                let mut report = Report::build(ReportKind::Error, &self.source_name, at)
                    .with_message(&err.message)
                    .with_label(
                        Label::new((&self.source_name, at..at + 1))
                            .with_color(Color::Red)
                            .with_message(match &err.actual {
                                Some(actual) => format!("found {actual}"),
                                None => "here".to_string(),
                            }),
                    );
                if let Some(expect) = &err.expect {
                    report = report.with_note(format!("expected {expect}"));
                }
                report
                    .finish()
                    .eprint((&self.source_name, Source::from(self.source)))
                    .unwrap();
            }
            LangError::Compile(err) => {
                for item in &err.items {
                    Report::build(ReportKind::Error, &self.source_name, item.span.start.index)
                        .with_message(&item.message)
                        .with_label(
                            Label::new((
                                &self.source_name,
                                item.span.start.index..item.span.end.index.max(item.span.start.index + 1),
                            ))
                            .with_color(Color::Red)
                            .with_message("here"),
                        )
                        .finish()
                        .eprint((&self.source_name, Source::from(self.source)))
                        .unwrap();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile_graph, AgentRegistry};
    use crate::parser::parse;

    #[test]
    fn parser_errors_produce_one_point_record() {
        let source = "a = ;";
        let error = LangError::from(parse(source).unwrap_err());
        let records = diagnostics("main.flow", source, &error);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, DiagnosticKind::Parse);
        assert_eq!(record.path, "main.flow");
        assert_eq!(record.start.row, 1);
        assert_eq!(record.end.column, record.start.column + 1);
        assert_eq!(record.line, "a = ;");
    }

    #[test]
    fn compiler_errors_produce_one_record_per_item() {
        let source = "@a(x1) @b(x2) n = identity(1);";
        let graph = parse(source).unwrap();
        let registry = AgentRegistry::from_names(["identity"]);
        let error = LangError::from(compile_graph(&graph, &registry).unwrap_err());
        let records = diagnostics("main.flow", source, &error);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "Identifier not found: x1");
        assert_eq!(records[1].message, "Identifier not found: x2");
        assert!(records.iter().all(|r| r.kind == DiagnosticKind::Compile));
    }

    #[test]
    fn line_excerpt_spans_the_failing_row() {
        let source = "static a = 1;\nb = identity({x: missing});\nstatic c = 2;";
        let graph = parse(source).unwrap();
        let registry = AgentRegistry::from_names(["identity"]);
        let error = LangError::from(compile_graph(&graph, &registry).unwrap_err());
        let records = diagnostics("main.flow", source, &error);
        assert_eq!(records[0].line, "b = identity({x: missing});");
        assert_eq!(records[0].start.row, 2);
    }

    #[test]
    fn line_at_clamps_to_the_end_of_input() {
        assert_eq!(line_at("a = 1", 5), "a = 1");
        assert_eq!(line_at("a;\nb", 100), "b");
        assert_eq!(line_at("", 0), "");
    }

    #[test]
    fn errors_format_their_messages() {
        let source = "a = identity({x: missing});";
        let graph = parse(source).unwrap();
        let registry = AgentRegistry::from_names(["identity"]);
        let error = compile_graph(&graph, &registry).unwrap_err();
        assert_eq!(error.to_string(), "Identifier not found: missing");
    }
}
