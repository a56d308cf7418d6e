//! Abstract syntax tree for FlowScript.
//!
//! The root type is [`Graph`], an ordered list of statements. Every node is
//! wrapped in [`Spanned`] so its source range (and any `@name(value)`
//! annotations written in front of it) travel with it through compilation,
//! enabling precise error reporting.
//!
//! ```text
//! Graph
//! └── statements: Vec<Spanned<Statement>>
//!     ├── Static   { name, value }      static n = expr;
//!     └── Computed { name?, body }      [n =] expr;
//! ```
//!
//! Expressions form a tagged union ([`Expr`]) covering literals, containers,
//! postfix access and calls, binary operator chains, conditionals, lambdas
//! ([`Expr::AgentDef`]) and nested graph blocks.
//!
//! All types implement `Serialize`/`Deserialize` for JSON interop:
//!
//! ```rust
//! use flowscript::parse;
//!
//! let graph = parse("a = identity({x: 1});").unwrap();
//! let json = serde_json::to_string(&graph).unwrap();
//! assert!(json.contains("Computed"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use crate::cursor::{Position, Span};

/// A value with an associated source span and annotation list.
///
/// The `annotations` list is populated for statements (and the file-level
/// version annotation); it stays empty for plain expression positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    /// The wrapped value.
    pub node: T,
    /// Source range of the wrapped value.
    pub span: Span,
    /// `@name(value)` annotations written in front of the node.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self {
            node,
            span,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotations(node: T, span: Span, annotations: Vec<Annotation>) -> Self {
        Self {
            node,
            span,
            annotations,
        }
    }

    /// Transform the inner value while preserving span and annotations.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
            annotations: self.annotations,
        }
    }
}

/// A single `@name(value)` annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub value: Spanned<Expr>,
    pub span: Span,
}

/// An ordered sequence of statements. Produced for whole files and for
/// brace-delimited graph blocks in expression position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub statements: Vec<Spanned<Statement>>,
}

/// A `;`-terminated statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `static name = expr;` - an immutable value binding.
    Static {
        name: Spanned<String>,
        value: Spanned<Expr>,
    },
    /// `[name =] expr;` - a computed node, anonymous when `name` is absent.
    Computed {
        name: Option<Spanned<String>>,
        body: Spanned<Expr>,
    },
}

impl Statement {
    /// The declared name, if the statement has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Statement::Static { name, .. } => Some(&name.node),
            Statement::Computed { name, .. } => name.as_ref().map(|n| n.node.as_str()),
        }
    }
}

/// One run of a string literal: literal text or a `${expr}` interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StringSegment {
    Text(String),
    Interpolation(Box<Spanned<Expr>>),
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Numeric literal: `42`, `-0.5`.
    Number(f64),
    /// Boolean literal: `true` / `false`.
    Boolean(bool),
    /// Null literal.
    Null,
    /// String literal without interpolation.
    RawString(String),
    /// String literal containing at least one `${expr}` interpolation.
    InterpolatedString(Vec<StringSegment>),
    /// Array literal: `[a, b, c]`.
    Array(Vec<Spanned<Expr>>),
    /// Object literal: `{key: value, ...}`. Key order is preserved.
    Object(IndexMap<String, Spanned<Expr>>),
    /// A bare name, resolved against the scope stack during lowering.
    Identifier(String),
    /// Index access: `base[index]`.
    ArrayAt {
        array: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    /// Member access: `base.name`.
    ObjectMember {
        object: Box<Spanned<Expr>>,
        member: Spanned<String>,
    },
    /// Agent call: `callee(arg?)`.
    AgentCall {
        agent: Box<Spanned<Expr>>,
        arg: Option<Box<Spanned<Expr>>>,
    },
    /// Binary operator application.
    Binary {
        op: BinOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    /// `if cond then a else b`; every branch is an expression or a graph
    /// block.
    IfThenElse {
        condition: Box<Spanned<Expr>>,
        then_branch: Box<Spanned<Expr>>,
        else_branch: Box<Spanned<Expr>>,
    },
    /// Lambda: `(param?) -> body`.
    AgentDef {
        param: Option<Spanned<String>>,
        body: Box<Spanned<Expr>>,
    },
    /// Parenthesized expression.
    Paren(Box<Spanned<Expr>>),
    /// A `{ statements... }` graph block in expression position.
    NestedGraph(Graph),
}

/// Binary operators, grouped into precedence classes by [`BinOp::class`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // ^
    Pow,
    // * / %
    Mul,
    Div,
    Mod,
    // + -
    Add,
    Sub,
    // < <= > >=
    Lt,
    Le,
    Gt,
    Ge,
    // == !=
    Eq,
    Ne,
    // && ||
    And,
    Or,
    // |> --> >> >>= >>- ->> :>
    Pipe,
    Chain,
    Compose,
    Bind,
    MapPipe,
    Forward,
    Inject,
}

/// Precedence classes, tightest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpClass {
    Power,
    MulDivMod,
    PlusMinus,
    Relational,
    Equality,
    Logical,
    Pipeline,
}

impl BinOp {
    /// The precedence class this operator folds at.
    pub fn class(&self) -> OpClass {
        match self {
            BinOp::Pow => OpClass::Power,
            BinOp::Mul | BinOp::Div | BinOp::Mod => OpClass::MulDivMod,
            BinOp::Add | BinOp::Sub => OpClass::PlusMinus,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => OpClass::Relational,
            BinOp::Eq | BinOp::Ne => OpClass::Equality,
            BinOp::And | BinOp::Or => OpClass::Logical,
            BinOp::Pipe
            | BinOp::Chain
            | BinOp::Compose
            | BinOp::Bind
            | BinOp::MapPipe
            | BinOp::Forward
            | BinOp::Inject => OpClass::Pipeline,
        }
    }

    /// The surface syntax of this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Pow => "^",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Pipe => "|>",
            BinOp::Chain => "-->",
            BinOp::Compose => ">>",
            BinOp::Bind => ">>=",
            BinOp::MapPipe => ">>-",
            BinOp::Forward => "->>",
            BinOp::Inject => ":>",
        }
    }

    /// The built-in agent this operator desugars to.
    pub fn agent_name(&self) -> &'static str {
        match self {
            BinOp::Pow => "powAgent",
            BinOp::Mul => "mulAgent",
            BinOp::Div => "divAgent",
            BinOp::Mod => "modAgent",
            BinOp::Add => "plusAgent",
            BinOp::Sub => "minusAgent",
            BinOp::Lt => "ltAgent",
            BinOp::Le => "leAgent",
            BinOp::Gt => "gtAgent",
            BinOp::Ge => "geAgent",
            BinOp::Eq => "eqAgent",
            BinOp::Ne => "neqAgent",
            BinOp::And => "andAgent",
            BinOp::Or => "orAgent",
            BinOp::Pipe => "pipeAgent",
            BinOp::Chain => "chainAgent",
            BinOp::Compose => "composeAgent",
            BinOp::Bind => "bindAgent",
            BinOp::MapPipe => "mapAgent",
            BinOp::Forward => "forwardAgent",
            BinOp::Inject => "injectAgent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Position;

    #[test]
    fn spanned_map_preserves_location() {
        let span = Span::point(Position::start());
        let spanned = Spanned::new(5u32, span);
        let doubled = spanned.map(|n| n * 2);
        assert_eq!(doubled.node, 10);
        assert_eq!(doubled.span, span);
    }

    #[test]
    fn operator_classes_follow_the_ladder() {
        assert_eq!(BinOp::Pow.class(), OpClass::Power);
        assert_eq!(BinOp::Mod.class(), OpClass::MulDivMod);
        assert_eq!(BinOp::Sub.class(), OpClass::PlusMinus);
        assert_eq!(BinOp::Ge.class(), OpClass::Relational);
        assert_eq!(BinOp::Ne.class(), OpClass::Equality);
        assert_eq!(BinOp::Or.class(), OpClass::Logical);
        assert_eq!(BinOp::Bind.class(), OpClass::Pipeline);
    }

    #[test]
    fn operator_agents_are_fixed() {
        assert_eq!(BinOp::Add.agent_name(), "plusAgent");
        assert_eq!(BinOp::Pow.agent_name(), "powAgent");
        assert_eq!(BinOp::Pipe.symbol(), "|>");
    }
}
