//! Lexical scope frames and the native-agent registry.
//!
//! Frames form a parent-linked chain stored in an arena: pushing a graph or
//! lambda body appends a frame pointing at the current one, popping walks
//! the parent link back. A frame is never mutated after it is built, so a
//! lookup result is stable for the whole lowering of that scope.

use indexmap::{IndexMap, IndexSet};

/// Agent names built-in operator and control desugaring relies on.
pub const DESUGAR_AGENTS: &[&str] = &[
    "plusAgent",
    "minusAgent",
    "mulAgent",
    "divAgent",
    "modAgent",
    "powAgent",
    "ltAgent",
    "leAgent",
    "gtAgent",
    "geAgent",
    "eqAgent",
    "neqAgent",
    "andAgent",
    "orAgent",
    "pipeAgent",
    "chainAgent",
    "composeAgent",
    "bindAgent",
    "mapAgent",
    "forwardAgent",
    "injectAgent",
    "concatAgent",
    "caseAgent",
    "defAgent",
    "nestedAgent",
];

/// The set of native-agent names visible to a compilation.
///
/// The compiler treats these purely as scope-resolution leaves; what the
/// agents do at run time is the execution engine's concern.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    names: IndexSet<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Add the fixed agent names that operator, string, conditional and
    /// lambda desugaring emit, so compiled output always resolves.
    pub fn with_operators(mut self) -> Self {
        for name in DESUGAR_AGENTS {
            self.names.insert((*name).to_string());
        }
        self
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What a name in scope stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackItem {
    /// A node declared by a statement in the frame's graph.
    Node,
    /// A lambda parameter.
    Parameter,
    /// A pre-seeded native agent.
    NativeAgent,
}

/// How an identifier resolved against the current frame chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Declared in the current frame.
    Local,
    /// Declared in an ancestor frame; must be threaded down as a capture.
    Captured,
    /// A native agent; emitted as a bare name, never captured.
    NativeAgent,
}

#[derive(Debug, Clone)]
struct Frame {
    items: IndexMap<String, StackItem>,
    parent: Option<usize>,
}

/// The arena of scope frames plus the index of the current one.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    current: usize,
}

impl ScopeStack {
    /// A stack whose root frame holds the native-agent registry.
    pub fn new(registry: &AgentRegistry) -> Self {
        let items = registry
            .names()
            .map(|name| (name.to_string(), StackItem::NativeAgent))
            .collect();
        Self {
            frames: vec![Frame {
                items,
                parent: None,
            }],
            current: 0,
        }
    }

    /// Enter a graph or lambda body with its pre-collected declarations.
    pub fn push(&mut self, items: IndexMap<String, StackItem>) {
        self.frames.push(Frame {
            items,
            parent: Some(self.current),
        });
        self.current = self.frames.len() - 1;
    }

    /// Leave the current frame. The frame stays in the arena; only the
    /// current index moves.
    pub fn pop(&mut self) {
        if let Some(parent) = self.frames[self.current].parent {
            self.current = parent;
        }
    }

    /// Index of the current frame, used to pin down which frame a node
    /// being lowered was declared in.
    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Walk the frame chain for `name`. Returns the classification and the
    /// index of the frame that defined it.
    pub fn resolve(&self, name: &str) -> Option<(Resolution, usize)> {
        let mut index = Some(self.current);
        let mut local = true;
        while let Some(i) = index {
            if let Some(item) = self.frames[i].items.get(name) {
                let resolution = match item {
                    StackItem::NativeAgent => Resolution::NativeAgent,
                    _ if local => Resolution::Local,
                    _ => Resolution::Captured,
                };
                return Some((resolution, i));
            }
            local = false;
            index = self.frames[i].parent;
        }
        None
    }
}
