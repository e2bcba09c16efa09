//! Immutable syntax trees.
//!
//! A [`SyntaxTree`] owns an arena of [`Node`]s. Trees are never edited: every
//! reparse builds a new tree, and documents share the current one behind an
//! `Arc`, so concurrent readers can walk a tree while a newer version is being
//! produced.

use std::ops::Range;

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Role of a relation declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRole {
    Input,
    Output,
    Internal,
}

impl RelationRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Internal => "internal",
        }
    }
}

/// Closed set of node kinds produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// `import a::b [as c]`; the node name is the module path text.
    Import {
        segments: Vec<String>,
        alias: Option<String>,
    },
    Relation {
        role: RelationRole,
    },
    /// A relation column `name: Type`.
    Column,
    /// A rule or fact; the node name is the first head relation.
    Rule {
        is_fact: bool,
    },
    Function {
        is_extern: bool,
    },
    Typedef {
        is_extern: bool,
    },
    /// A union constructor inside a typedef.
    Constructor,
    /// A constructor field `name: Type`.
    Field,
    Transformer,
    Index,
    Apply,
    /// Unparseable region; children are never attached to error nodes.
    Error {
        message: String,
    },
}

impl NodeKind {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Identifier text with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte span of the whole construct.
    pub span: Range<usize>,
    pub name: Option<Name>,
    /// Type annotation text for columns and fields.
    pub detail: Option<String>,
    pub children: Vec<NodeId>,
}

/// Parsed DDlog file.
///
/// # Examples
///
/// ```
/// use ddlog_core::syntax::{NodeKind, parse};
///
/// let tree = parse("relation R(x: u32)");
/// let (_, root) = tree.roots().next().unwrap();
/// assert!(matches!(root.kind, NodeKind::Relation { .. }));
/// assert_eq!(root.name.as_ref().unwrap().text, "R");
/// assert!(!tree.has_errors());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyntaxTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) source_len: usize,
}

impl SyntaxTree {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Top-level items in source order.
    pub fn roots(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.roots.iter().map(|&id| (id, self.node(id)))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.node(id)
            .children
            .iter()
            .map(|&child| (child, self.node(child)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Length in bytes of the source this tree was parsed from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn has_errors(&self) -> bool {
        self.nodes.iter().any(|node| node.kind.is_error())
    }

    /// All error nodes, in arena order.
    pub fn errors(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|node| node.kind.is_error())
    }

    /// Top-level import declarations in source order.
    pub fn imports(&self) -> impl Iterator<Item = &Node> + '_ {
        self.roots()
            .map(|(_, node)| node)
            .filter(|node| matches!(node.kind, NodeKind::Import { .. }))
    }
}
