//! # flowscript
//!
//! Parser and compiler for FlowScript, a small DSL that compiles into
//! declarative computation-graph documents consumed by an external
//! graph-execution engine.
//!
//! ## Pipeline
//!
//! ```text
//! source text
//!     │  cursor + combinators        (cursor, combinators)
//!     ▼
//! syntax tree with spans             (parser, ast)
//!     │  scope resolution, capture
//!     │  analysis, desugaring        (compiler)
//!     ▼
//! graph document                     (document)
//! ```
//!
//! The engine executing the document, and the catalog of native agents, are
//! external: the compiler consumes the catalog purely as a set of names
//! ([`AgentRegistry`]) and emits every agent as an opaque leaf.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowscript::{compile, AgentRegistry};
//!
//! let registry = AgentRegistry::from_names(["identity"]).with_operators();
//! let doc = compile("static a = 1;\nb = identity({x: a});", &registry).unwrap();
//!
//! assert_eq!(
//!     doc.to_json_value(),
//!     serde_json::json!({
//!         "nodes": {
//!             "a": {"value": 1},
//!             "b": {"agent": "identity", "inputs": {"x": ":a"}, "isResult": true},
//!         }
//!     })
//! );
//! ```
//!
//! ## Errors
//!
//! Both stages return typed failures ([`LangError`]); [`diagnostics`]
//! flattens them to uniform records and [`ErrorReporter`] pretty-prints
//! them:
//!
//! ```rust
//! use flowscript::{compile, diagnostics, AgentRegistry};
//!
//! let source = "b = identity({x: missing});";
//! let registry = AgentRegistry::from_names(["identity"]);
//! let error = compile(source, &registry).unwrap_err();
//! for record in diagnostics("main.flow", source, &error) {
//!     eprintln!("{}:{}:{} {}", record.path, record.start.row, record.start.column, record.message);
//! }
//! ```

pub mod ast;
pub mod combinators;
pub mod compiler;
pub mod cursor;
pub mod document;
pub mod error;
pub mod parser;

pub use ast::{Annotation, BinOp, Expr, Graph, OpClass, Spanned, Statement, StringSegment};
pub use combinators::{ErrorKind, ParserError};
pub use compiler::{compile_graph, AgentRegistry};
pub use cursor::{Cursor, Position, Span};
pub use document::{AgentNode, GraphDocument, NodeDocument, ValueNode};
pub use error::{
    diagnostics, CompileError, CompileErrorItem, Diagnostic, DiagnosticKind, ErrorReporter,
    LangError, LineCol,
};
pub use parser::parse;

/// Parse and lower FlowScript source in one step.
pub fn compile(source: &str, registry: &AgentRegistry) -> Result<GraphDocument, LangError> {
    let graph = parser::parse(source)?;
    compiler::compile_graph(&graph, registry).map_err(LangError::from)
}
