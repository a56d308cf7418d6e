//! The lowering engine: syntax tree in, graph document out.
//!
//! Lowering is a single depth-first walk threading an explicit [`Context`]
//! (scope stack, global anonymous-name counter, the chain of nodes currently
//! being defined). Nothing is shared or global, so independent compilations
//! can run concurrently.
//!
//! The walk distinguishes two positions:
//!
//! - **value position** (`lower_value`): produces the JSON that stands for
//!   an expression inside `inputs` or a `value` binding. Plain literals,
//!   identifiers and containers are inlined; anything computed (a call, an
//!   operator chain, a conditional, a lambda, an interpolated string, a
//!   graph block) is hoisted into a fresh anonymous node of the enclosing
//!   graph and replaced by a `:name` reference.
//! - **node position** (`lower_node`): produces the node document for a
//!   statement body or a hoisted expression.
//!
//! Operators are pure sugar: every binary node lowers to a call of a fixed
//! built-in agent through the same path as an explicit call. Conditionals
//! lower to a `caseAgent` call over three nullary closures so they share
//! the lambda capture mechanism. A nested graph collects the captures its
//! body needs; every name an enclosing scope cannot satisfy locally is
//! re-raised one level further up and declared as an input on each nested
//! node in between.

mod scope;

pub use scope::{AgentRegistry, Resolution, ScopeStack, StackItem, DESUGAR_AGENTS};

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::ast::{Annotation, BinOp, Expr, Graph, Span, Spanned, Statement, StringSegment};
use crate::document::{AgentNode, GraphDocument, NodeDocument, ValueNode};
use crate::error::{CompileError, CompileErrorItem};

/// Mutable compilation state, threaded explicitly through the walk.
struct Context {
    scopes: ScopeStack,
    /// Next anonymous node number. Never reset, so anonymous names are
    /// unique across the whole compilation.
    anon: u32,
    /// The chain of (name, frame) pairs currently being defined, innermost
    /// last. A reference to any of them is a use-before-definition.
    defining: Vec<(String, usize)>,
}

impl Context {
    fn new(registry: &AgentRegistry) -> Self {
        Self {
            scopes: ScopeStack::new(registry),
            anon: 0,
            defining: Vec::new(),
        }
    }

    fn fresh_anon(&mut self) -> String {
        let n = self.anon;
        self.anon += 1;
        format!("__anon{n}__")
    }
}

/// Captures and hoisted nodes produced while lowering one statement.
#[derive(Default)]
struct Effects {
    captures: IndexMap<String, Span>,
    nodes: IndexMap<String, NodeDocument>,
}

/// Compile a parsed graph against a native-agent registry.
pub fn compile_graph(
    graph: &Spanned<Graph>,
    registry: &AgentRegistry,
) -> Result<GraphDocument, CompileError> {
    let mut ctx = Context::new(registry);
    let items = frame_items(&graph.node.statements, None)?;
    ctx.scopes.push(items);
    let result = lower_statement_list(&graph.node.statements, &mut ctx);
    ctx.scopes.pop();
    let (mut doc, captures) = result?;
    // The outermost scope has nothing left to capture from.
    if let Some((name, span)) = captures.into_iter().next() {
        return Err(CompileError::single(
            format!("Identifier not found: {name}"),
            span,
        ));
    }
    apply_file_annotations(&mut doc, &graph.annotations)?;
    Ok(doc)
}

fn apply_file_annotations(
    doc: &mut GraphDocument,
    annotations: &[Annotation],
) -> Result<(), CompileError> {
    let mut items = Vec::new();
    for ann in annotations {
        if ann.name == "version" {
            match &ann.value.node {
                Expr::RawString(text) => match text.parse::<f64>() {
                    Ok(version) => doc.version = Some(version),
                    Err(_) => items.push(CompileErrorItem {
                        message: format!("Invalid version annotation: {text}"),
                        span: ann.span,
                    }),
                },
                _ => items.push(CompileErrorItem {
                    message: "The version annotation takes a string literal".to_string(),
                    span: ann.span,
                }),
            }
        } else {
            items.push(CompileErrorItem {
                message: format!("Unsupported file annotation: {}", ann.name),
                span: ann.span,
            });
        }
    }
    if items.is_empty() {
        Ok(())
    } else {
        Err(CompileError::new(items))
    }
}

/// Collect the declarations of a graph (plus a lambda parameter) into a
/// frame, rejecting duplicates.
fn frame_items(
    statements: &[Spanned<Statement>],
    param: Option<&Spanned<String>>,
) -> Result<IndexMap<String, StackItem>, CompileError> {
    let mut items = IndexMap::new();
    if let Some(param) = param {
        items.insert(param.node.clone(), StackItem::Parameter);
    }
    for stmt in statements {
        if let Some(name) = stmt.node.name() {
            if items.insert(name.to_string(), StackItem::Node).is_some() {
                return Err(CompileError::single(
                    format!("Duplicate node name: {name}"),
                    stmt.span,
                ));
            }
        }
    }
    Ok(items)
}

/// Lower the statements of one graph. The frame for this graph must
/// already be pushed; the returned captures are the names its body needs
/// from enclosing scopes.
fn lower_statement_list(
    statements: &[Spanned<Statement>],
    ctx: &mut Context,
) -> Result<(GraphDocument, IndexMap<String, Span>), CompileError> {
    let mut doc = GraphDocument::new();
    let mut captures: IndexMap<String, Span> = IndexMap::new();
    let total = statements.len();
    for (i, stmt) in statements.iter().enumerate() {
        let is_last = i + 1 == total;
        let mut fx = Effects::default();
        let frame = ctx.scopes.current_frame();
        let (name, mut node, is_static) = match &stmt.node {
            Statement::Static { name, value } => {
                ctx.defining.push((name.node.clone(), frame));
                let json = lower_value(value, ctx, &mut fx)?;
                (
                    name.node.clone(),
                    NodeDocument::Value(ValueNode::new(json)),
                    true,
                )
            }
            Statement::Computed { name, body } => {
                let node_name = match name {
                    Some(n) => n.node.clone(),
                    None => ctx.fresh_anon(),
                };
                ctx.defining.push((node_name.clone(), frame));
                let node = lower_node(body, ctx, &mut fx)?;
                (node_name, node, false)
            }
        };
        apply_annotations(&mut node, &stmt.annotations, ctx, &mut fx)?;
        ctx.defining.pop();

        // Hoisted nodes first, so every reference points at an earlier key.
        for (key, hoisted) in fx.nodes {
            doc.nodes.insert(key, hoisted);
        }
        for (key, span) in fx.captures {
            captures.entry(key).or_insert(span);
        }
        if is_last && !is_static && node.is_result().is_none() {
            node.set_is_result(true);
        }
        doc.nodes.insert(name, node);
    }
    Ok((doc, captures))
}

/// Lower every annotation on a node, aggregating all failures instead of
/// stopping at the first.
fn apply_annotations(
    node: &mut NodeDocument,
    annotations: &[Annotation],
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<(), CompileError> {
    let mut items = Vec::new();
    for ann in annotations {
        match lower_value(&ann.value, ctx, fx) {
            Ok(json) => {
                if ann.name == "isResult" {
                    match json {
                        Value::Bool(flag) => node.set_is_result(flag),
                        _ => items.push(CompileErrorItem {
                            message: "The isResult annotation takes a boolean".to_string(),
                            span: ann.span,
                        }),
                    }
                } else {
                    node.set_extra(ann.name.clone(), json);
                }
            }
            Err(err) => items.extend(err.items),
        }
    }
    if items.is_empty() {
        Ok(())
    } else {
        Err(CompileError::new(items))
    }
}

// ---------------------------------------------------------------------------
// Value position
// ---------------------------------------------------------------------------

fn lower_value(
    expr: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<Value, CompileError> {
    match &expr.node {
        Expr::Number(n) => Ok(number_value(*n)),
        Expr::Boolean(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::RawString(text) => Ok(Value::String(text.clone())),
        Expr::Identifier(name) => lower_identifier(name, expr.span, ctx, fx),
        Expr::Paren(inner) => lower_value(inner, ctx, fx),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(lower_value(item, ctx, fx)?);
            }
            Ok(Value::Array(out))
        }
        Expr::Object(entries) => {
            let mut map = serde_json::Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), lower_value(value, ctx, fx)?);
            }
            Ok(Value::Object(map))
        }
        Expr::ObjectMember { object, member } => {
            let base = lower_reference_base(object, ctx, fx)?;
            Ok(Value::String(format!("{base}.{}", member.node)))
        }
        Expr::ArrayAt { array, index } => {
            let base = lower_reference_base(array, ctx, fx)?;
            let position = constant_index(index)?;
            Ok(Value::String(format!("{base}.${position}")))
        }
        Expr::InterpolatedString(_)
        | Expr::AgentCall { .. }
        | Expr::Binary { .. }
        | Expr::IfThenElse { .. }
        | Expr::AgentDef { .. }
        | Expr::NestedGraph(_) => hoist(expr, ctx, fx),
    }
}

/// Hoist a computed expression into a fresh anonymous node of the
/// enclosing graph and return a reference to it.
fn hoist(
    expr: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<Value, CompileError> {
    let name = ctx.fresh_anon();
    let node = lower_node(expr, ctx, fx)?;
    fx.nodes.insert(name.clone(), node);
    Ok(Value::String(format!(":{name}")))
}

fn lower_identifier(
    name: &str,
    span: Span,
    ctx: &Context,
    fx: &mut Effects,
) -> Result<Value, CompileError> {
    match ctx.scopes.resolve(name) {
        Some((resolution, frame)) => {
            if ctx
                .defining
                .iter()
                .any(|(defined, in_frame)| defined == name && *in_frame == frame)
            {
                return Err(CompileError::single(
                    format!("Identifier can not be used before its definition: {name}"),
                    span,
                ));
            }
            match resolution {
                Resolution::Local => Ok(Value::String(format!(":{name}"))),
                Resolution::Captured => {
                    fx.captures.entry(name.to_string()).or_insert(span);
                    Ok(Value::String(format!(":{name}")))
                }
                Resolution::NativeAgent => Ok(Value::String(name.to_string())),
            }
        }
        None => Err(CompileError::single(
            format!("Identifier not found: {name}"),
            span,
        )),
    }
}

/// Lower the base of a member or index access down to a `:name` reference,
/// hoisting a non-reference base into its own value node first.
fn lower_reference_base(
    expr: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<String, CompileError> {
    if let Expr::Identifier(name) = &expr.node {
        if matches!(
            ctx.scopes.resolve(name),
            Some((Resolution::NativeAgent, _))
        ) {
            return Err(CompileError::single(
                format!("An agent can not be used as a postfix target: {name}"),
                expr.span,
            ));
        }
    }
    match lower_value(expr, ctx, fx)? {
        Value::String(reference) if reference.starts_with(':') => Ok(reference),
        other => {
            let name = ctx.fresh_anon();
            fx.nodes
                .insert(name.clone(), NodeDocument::Value(ValueNode::new(other)));
            Ok(format!(":{name}"))
        }
    }
}

fn constant_index(index: &Spanned<Expr>) -> Result<u64, CompileError> {
    let mut inner = index;
    while let Expr::Paren(wrapped) = &inner.node {
        inner = wrapped;
    }
    match &inner.node {
        Expr::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as u64),
        _ => Err(CompileError::single(
            "Array index must be a non-negative number literal".to_string(),
            index.span,
        )),
    }
}

fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

// ---------------------------------------------------------------------------
// Node position
// ---------------------------------------------------------------------------

fn lower_node(
    expr: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<NodeDocument, CompileError> {
    match &expr.node {
        Expr::Paren(inner) => lower_node(inner, ctx, fx),
        Expr::AgentCall { agent, arg } => {
            let target = lower_agent_target(agent, ctx, fx)?;
            let inputs = match arg {
                Some(arg) => Some(lower_value(arg, ctx, fx)?),
                None => None,
            };
            let mut node = AgentNode::new(target);
            node.inputs = inputs;
            Ok(NodeDocument::Agent(node))
        }
        Expr::Binary { op, left, right } => {
            let left_json = lower_value(left, ctx, fx)?;
            let right_json = lower_value(right, ctx, fx)?;
            let mut inputs = serde_json::Map::new();
            if *op == BinOp::Pow {
                inputs.insert("base".to_string(), left_json);
                inputs.insert("exponent".to_string(), right_json);
            } else {
                inputs.insert("left".to_string(), left_json);
                inputs.insert("right".to_string(), right_json);
            }
            Ok(NodeDocument::Agent(
                AgentNode::new(op.agent_name()).with_inputs(Value::Object(inputs)),
            ))
        }
        Expr::InterpolatedString(segments) => {
            let mut parts = Vec::with_capacity(segments.len());
            for segment in segments {
                match segment {
                    StringSegment::Text(text) => parts.push(Value::String(text.clone())),
                    StringSegment::Interpolation(inner) => {
                        parts.push(lower_value(inner, ctx, fx)?)
                    }
                }
            }
            Ok(NodeDocument::Agent(
                AgentNode::new("concatAgent").with_inputs(json!({ "array": parts })),
            ))
        }
        Expr::IfThenElse {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition_ref = hoist_closure(condition, ctx, fx)?;
            let then_ref = hoist_closure(then_branch, ctx, fx)?;
            let else_ref = hoist_closure(else_branch, ctx, fx)?;
            let inputs = json!({
                "conditions": [
                    { "if": condition_ref, "then": then_ref },
                    { "else": else_ref },
                ]
            });
            Ok(NodeDocument::Agent(
                AgentNode::new("caseAgent").with_inputs(inputs),
            ))
        }
        Expr::AgentDef { param, body } => lower_closure(param.as_ref(), body, ctx, fx),
        Expr::NestedGraph(graph) => lower_nested_graph(graph, ctx, fx),
        _ => {
            let json = lower_value(expr, ctx, fx)?;
            Ok(NodeDocument::Value(ValueNode::new(json)))
        }
    }
}

/// Resolve the callee of an agent call: a bare native-agent name, a `:name`
/// node reference, or a reference to a hoisted lambda. Literals are not
/// callable.
fn lower_agent_target(
    agent: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<String, CompileError> {
    match &agent.node {
        Expr::Paren(inner) => lower_agent_target(inner, ctx, fx),
        Expr::Identifier(name) => match lower_identifier(name, agent.span, ctx, fx)? {
            Value::String(target) => Ok(target),
            _ => Err(CompileError::single(
                "A literal can not be called as an agent".to_string(),
                agent.span,
            )),
        },
        Expr::Number(_)
        | Expr::Boolean(_)
        | Expr::Null
        | Expr::RawString(_)
        | Expr::InterpolatedString(_)
        | Expr::Array(_)
        | Expr::Object(_) => Err(CompileError::single(
            "A literal can not be called as an agent".to_string(),
            agent.span,
        )),
        _ => match lower_value(agent, ctx, fx)? {
            Value::String(target) => Ok(target),
            _ => Err(CompileError::single(
                "A literal can not be called as an agent".to_string(),
                agent.span,
            )),
        },
    }
}

/// Reference a fresh nullary closure wrapping `body`, hoisted into the
/// enclosing graph. Used by conditional lowering.
fn hoist_closure(
    body: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<Value, CompileError> {
    let name = ctx.fresh_anon();
    let node = lower_closure(None, body, ctx, fx)?;
    fx.nodes.insert(name.clone(), node);
    Ok(Value::String(format!(":{name}")))
}

/// Lower a lambda body into a `defAgent` node: parameter, captures, the
/// body sub-graph, and the name of the node whose value the lambda returns.
fn lower_closure(
    param: Option<&Spanned<String>>,
    body: &Spanned<Expr>,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<NodeDocument, CompileError> {
    let statements: Vec<Spanned<Statement>> = match &body.node {
        Expr::NestedGraph(graph) => graph.statements.clone(),
        _ => vec![Spanned::new(
            Statement::Computed {
                name: None,
                body: body.clone(),
            },
            body.span,
        )],
    };
    let items = frame_items(&statements, param)?;
    ctx.scopes.push(items);
    let result = lower_statement_list(&statements, ctx);
    ctx.scopes.pop();
    let (graph_doc, child_captures) = result?;

    let return_name = graph_doc
        .nodes
        .keys()
        .last()
        .cloned()
        .unwrap_or_default();
    let capture_inputs = adopt_captures(child_captures, ctx, fx);

    let mut inputs = serde_json::Map::new();
    if let Some(param) = param {
        inputs.insert("args".to_string(), Value::String(param.node.clone()));
    }
    if !capture_inputs.is_empty() {
        let map = capture_inputs.into_iter().collect::<serde_json::Map<_, _>>();
        inputs.insert("capture".to_string(), Value::Object(map));
    }
    inputs.insert("return".to_string(), json!([return_name]));

    let mut node = AgentNode::new("defAgent").with_inputs(Value::Object(inputs));
    node.graph = Some(Box::new(graph_doc));
    Ok(NodeDocument::Agent(node))
}

fn lower_nested_graph(
    graph: &Graph,
    ctx: &mut Context,
    fx: &mut Effects,
) -> Result<NodeDocument, CompileError> {
    let items = frame_items(&graph.statements, None)?;
    ctx.scopes.push(items);
    let result = lower_statement_list(&graph.statements, ctx);
    ctx.scopes.pop();
    let (doc, child_captures) = result?;

    let capture_inputs = adopt_captures(child_captures, ctx, fx);
    let mut node = AgentNode::new("nestedAgent");
    if !capture_inputs.is_empty() {
        let map = capture_inputs.into_iter().collect::<serde_json::Map<_, _>>();
        node.inputs = Some(Value::Object(map));
    }
    node.graph = Some(Box::new(doc));
    Ok(NodeDocument::Agent(node))
}

/// Turn the captures a child scope reported into `{name: ":name"}` inputs
/// on the enclosing node. A name the current scope cannot satisfy locally
/// is re-raised to the next level up.
fn adopt_captures(
    child: IndexMap<String, Span>,
    ctx: &Context,
    fx: &mut Effects,
) -> IndexMap<String, Value> {
    let mut inputs = IndexMap::new();
    for (name, span) in child {
        inputs.insert(name.clone(), Value::String(format!(":{name}")));
        match ctx.scopes.resolve(&name) {
            Some((Resolution::Local, _)) => {}
            _ => {
                fx.captures.entry(name).or_insert(span);
            }
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> AgentRegistry {
        AgentRegistry::from_names(["identity", "println", "agent1", "agent2"]).with_operators()
    }

    fn compile_source(source: &str) -> GraphDocument {
        let graph = parse(source).unwrap();
        compile_graph(&graph, &registry()).unwrap()
    }

    fn compile_error(source: &str) -> CompileError {
        let graph = parse(source).unwrap();
        compile_graph(&graph, &registry()).unwrap_err()
    }

    #[test]
    fn static_and_computed_nodes_resolve_scope() {
        let doc = compile_source("static a = 1;\nb = identity({x: a});");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "a": {"value": 1},
                    "b": {"agent": "identity", "inputs": {"x": ":a"}, "isResult": true},
                }
            })
        );
    }

    #[test]
    fn self_reference_is_rejected() {
        let err = compile_error("static a = 1;\nb = identity({x: b});");
        assert_eq!(
            err.items[0].message,
            "Identifier can not be used before its definition: b"
        );
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = compile_error("static a = 1;\nb = identity({x: c});");
        assert_eq!(err.items[0].message, "Identifier not found: c");
    }

    #[test]
    fn sibling_forward_references_are_allowed() {
        let doc = compile_source("b = identity({x: c});\nstatic c = 1;");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "b": {"agent": "identity", "inputs": {"x": ":c"}},
                    "c": {"value": 1},
                }
            })
        );
    }

    #[test]
    fn nested_call_arguments_hoist_with_global_counter() {
        let doc = compile_source("a = agent1(agent2({x: 1}));");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "__anon0__": {"agent": "agent2", "inputs": {"x": 1}},
                    "a": {"agent": "agent1", "inputs": ":__anon0__", "isResult": true},
                }
            })
        );
    }

    #[test]
    fn anonymous_counter_never_resets_between_scopes() {
        let doc = compile_source("a = agent1(agent2(1));\nb = agent1(agent2(2));");
        let keys: Vec<&str> = doc.nodes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["__anon0__", "a", "__anon1__", "b"]);
    }

    #[test]
    fn nested_graphs_capture_enclosing_nodes() {
        let doc = compile_source("static a = 1;\n{ b = println({message: a}); };");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "a": {"value": 1},
                    "__anon0__": {
                        "agent": "nestedAgent",
                        "inputs": {"a": ":a"},
                        "graph": {
                            "nodes": {
                                "b": {
                                    "agent": "println",
                                    "inputs": {"message": ":a"},
                                    "isResult": true,
                                }
                            }
                        },
                        "isResult": true,
                    }
                }
            })
        );
    }

    #[test]
    fn captures_propagate_through_intermediate_scopes() {
        // `a` is defined two scopes above its use; the middle graph must
        // declare it as an input too.
        let doc =
            compile_source("static a = 1;\n{ { c = println({message: a}); }; };");
        let outer = match &doc.nodes["__anon0__"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(outer.inputs, Some(json!({"a": ":a"})));
        let middle_graph = outer.graph.as_ref().unwrap();
        let inner = match &middle_graph.nodes["__anon1__"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(inner.agent, "nestedAgent");
        assert_eq!(inner.inputs, Some(json!({"a": ":a"})));
        let inner_graph = inner.graph.as_ref().unwrap();
        let leaf = match &inner_graph.nodes["c"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(leaf.inputs, Some(json!({"message": ":a"})));
    }

    #[test]
    fn operators_desugar_to_agent_calls() {
        let doc = compile_source("1 + 1;");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "__anon0__": {
                        "agent": "plusAgent",
                        "inputs": {"left": 1, "right": 1},
                        "isResult": true,
                    }
                }
            })
        );
    }

    #[test]
    fn power_operator_uses_base_and_exponent() {
        let doc = compile_source("a = 2 ^ 3;");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "a": {
                        "agent": "powAgent",
                        "inputs": {"base": 2, "exponent": 3},
                        "isResult": true,
                    }
                }
            })
        );
    }

    #[test]
    fn operator_precedence_shapes_the_node_tree() {
        // (1 * (2 ^ 3)) / 4: the division is the named node, the factor and
        // the power are hoisted beneath it.
        let doc = compile_source("a = 1 * 2 ^ 3 / 4;");
        let node = match &doc.nodes["a"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(node.agent, "divAgent");
        let mul = match &doc.nodes["__anon0__"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(mul.agent, "mulAgent");
        let pow = match &doc.nodes["__anon1__"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(pow.agent, "powAgent");
    }

    #[test]
    fn interpolated_strings_become_concat_calls() {
        let doc = compile_source("static name = \"Tom\";\n\"hello, ${name}\";");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "name": {"value": "Tom"},
                    "__anon0__": {
                        "agent": "concatAgent",
                        "inputs": {"array": ["hello, ", ":name"]},
                        "isResult": true,
                    }
                }
            })
        );
    }

    #[test]
    fn plain_strings_stay_constants() {
        let doc = compile_source("static s = 'hello';");
        assert_eq!(
            doc.to_json_value(),
            json!({"nodes": {"s": {"value": "hello"}}})
        );
    }

    #[test]
    fn lambdas_lower_to_def_agent_nodes() {
        let doc = compile_source("static a = 1;\nf = (x) -> identity({v: x, w: a});");
        let node = match &doc.nodes["f"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(node.agent, "defAgent");
        let inputs = node.inputs.as_ref().unwrap();
        assert_eq!(inputs["args"], json!("x"));
        assert_eq!(inputs["capture"], json!({"a": ":a"}));
        assert_eq!(inputs["return"], json!(["__anon0__"]));
        let body = node.graph.as_ref().unwrap();
        assert_eq!(
            body.nodes["__anon0__"],
            NodeDocument::Agent(AgentNode {
                agent: "identity".to_string(),
                inputs: Some(json!({"v": ":x", "w": ":a"})),
                graph: None,
                is_result: Some(true),
                extra: IndexMap::new(),
            })
        );
    }

    #[test]
    fn lambda_graph_bodies_return_the_last_node() {
        let doc = compile_source("f = (x) -> { y = identity(x); y; };");
        let node = match &doc.nodes["f"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        let inputs = node.inputs.as_ref().unwrap();
        assert_eq!(inputs["return"], json!(["__anon0__"]));
        let body = node.graph.as_ref().unwrap();
        assert_eq!(body.nodes.len(), 2);
        assert!(body.nodes.contains_key("y"));
    }

    #[test]
    fn conditionals_lower_to_case_agent_over_closures() {
        let doc = compile_source("static a = 1;\nr = if a > 0 then identity(a) else identity(0);");
        let node = match &doc.nodes["r"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(node.agent, "caseAgent");
        // Each closure reserves its anonymous name before its body is
        // lowered, and the single-expression bodies hoist one node each.
        assert_eq!(
            node.inputs,
            Some(json!({
                "conditions": [
                    {"if": ":__anon0__", "then": ":__anon2__"},
                    {"else": ":__anon4__"},
                ]
            }))
        );
        for name in ["__anon0__", "__anon2__", "__anon4__"] {
            let closure = match &doc.nodes[name] {
                NodeDocument::Agent(node) => node,
                other => panic!("expected agent node, got {other:?}"),
            };
            assert_eq!(closure.agent, "defAgent");
        }
        // The condition and then branches reference `a`; the else branch
        // captures nothing.
        for name in ["__anon0__", "__anon2__"] {
            let closure = match &doc.nodes[name] {
                NodeDocument::Agent(node) => node,
                other => panic!("expected agent node, got {other:?}"),
            };
            let inputs = closure.inputs.as_ref().unwrap();
            assert_eq!(inputs["capture"], json!({"a": ":a"}));
        }
        let else_closure = match &doc.nodes["__anon4__"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert!(else_closure.inputs.as_ref().unwrap().get("capture").is_none());
    }

    #[test]
    fn value_shaped_computed_bodies_become_value_nodes() {
        let doc = compile_source("static a = 1;\nb = a;");
        assert_eq!(
            doc.to_json_value(),
            json!({
                "nodes": {
                    "a": {"value": 1},
                    "b": {"value": ":a", "isResult": true},
                }
            })
        );
    }

    #[test]
    fn member_and_index_extend_reference_paths() {
        let doc = compile_source("static a = {x: [1, 2]};\nb = identity(a.x[0]);");
        let node = match &doc.nodes["b"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(node.inputs, Some(json!(":a.x.$0")));
    }

    #[test]
    fn dynamic_array_index_is_rejected() {
        let err = compile_error("static a = [1];\nstatic i = 0;\nb = identity(a[i]);");
        assert_eq!(
            err.items[0].message,
            "Array index must be a non-negative number literal"
        );
    }

    #[test]
    fn literal_call_targets_are_rejected_at_lowering() {
        let err = compile_error("a = ('x')(1);");
        assert_eq!(err.items[0].message, "A literal can not be called as an agent");
    }

    #[test]
    fn calling_a_node_uses_a_reference_agent() {
        let doc = compile_source("f = (x) -> identity(x);\nr = f(41);");
        let node = match &doc.nodes["r"] {
            NodeDocument::Agent(node) => node,
            other => panic!("expected agent node, got {other:?}"),
        };
        assert_eq!(node.agent, ":f");
        assert_eq!(node.inputs, Some(json!(41)));
    }

    #[test]
    fn annotation_errors_aggregate_across_a_node() {
        let err = compile_error("@left(missing1) @right(missing2) a = identity(1);");
        let messages: Vec<&str> = err.items.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Identifier not found: missing1",
                "Identifier not found: missing2",
            ]
        );
    }

    #[test]
    fn annotations_become_node_keys() {
        let doc = compile_source("@console({after: true}) a = identity(1);\nb = identity(a);");
        let value = doc.to_json_value();
        assert_eq!(value["nodes"]["a"]["console"], json!({"after": true}));
        assert_eq!(value["nodes"]["a"].get("isResult"), None);
    }

    #[test]
    fn explicit_result_annotation_suppresses_the_implicit_flag() {
        let doc = compile_source("@isResult(false) a = identity(1);");
        let value = doc.to_json_value();
        assert_eq!(value["nodes"]["a"]["isResult"], json!(false));
    }

    #[test]
    fn version_annotation_sets_the_document_version() {
        let doc = {
            let graph = parse("@version(\"0.6\");\na = identity(1);").unwrap();
            compile_graph(&graph, &registry()).unwrap()
        };
        assert_eq!(doc.version, Some(0.6));
    }

    #[test]
    fn unsupported_file_annotation_is_rejected() {
        let graph = parse("@flavor(\"x\");\na = identity(1);").unwrap();
        let err = compile_graph(&graph, &registry()).unwrap_err();
        assert_eq!(err.items[0].message, "Unsupported file annotation: flavor");
    }

    #[test]
    fn duplicate_node_names_are_rejected() {
        let err = compile_error("a = identity(1);\na = identity(2);");
        assert_eq!(err.items[0].message, "Duplicate node name: a");
    }

    #[test]
    fn compilation_is_deterministic() {
        let source = "static a = 1;\nb = identity({x: a});\nif b then identity(1) else identity(2);";
        let graph = parse(source).unwrap();
        let first = compile_graph(&graph, &registry()).unwrap();
        let second = compile_graph(&graph, &registry()).unwrap();
        assert_eq!(first.to_json_string(), second.to_json_string());
    }
}
