//! Document outline.
//!
//! Symbols are computed from a parsed snapshot with an explicit work list, so
//! deeply nested trees never grow the call stack.

use ddlog_core::syntax::{Node, NodeId, NodeKind, SyntaxTree};
use ddlog_core::{Range, Text};
use std::fmt;
use tower_lsp_server::ls_types::{self, DocumentSymbol};

/// Closed set of declaration kinds shown in the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Relation,
    Rule,
    Function,
    Type,
    Module,
    Transformer,
    Index,
    Constructor,
    Field,
}

impl DeclarationKind {
    /// Outline kind for a node, or `None` for nodes that are not shown.
    pub fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Import { .. } => Some(Self::Module),
            NodeKind::Relation { .. } => Some(Self::Relation),
            NodeKind::Rule { .. } => Some(Self::Rule),
            NodeKind::Function { .. } => Some(Self::Function),
            NodeKind::Typedef { .. } => Some(Self::Type),
            NodeKind::Constructor => Some(Self::Constructor),
            NodeKind::Column | NodeKind::Field => Some(Self::Field),
            NodeKind::Transformer => Some(Self::Transformer),
            NodeKind::Index => Some(Self::Index),
            NodeKind::Apply | NodeKind::Error { .. } => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relation => "relation",
            Self::Rule => "rule",
            Self::Function => "function",
            Self::Type => "type",
            Self::Module => "module",
            Self::Transformer => "transformer",
            Self::Index => "index",
            Self::Constructor => "constructor",
            Self::Field => "field",
        }
    }

    pub fn to_lsp(self) -> ls_types::SymbolKind {
        match self {
            Self::Relation => ls_types::SymbolKind::STRUCT,
            Self::Rule => ls_types::SymbolKind::EVENT,
            Self::Function => ls_types::SymbolKind::FUNCTION,
            Self::Type => ls_types::SymbolKind::ENUM,
            Self::Module => ls_types::SymbolKind::MODULE,
            Self::Transformer => ls_types::SymbolKind::OPERATOR,
            Self::Index => ls_types::SymbolKind::KEY,
            Self::Constructor => ls_types::SymbolKind::ENUM_MEMBER,
            Self::Field => ls_types::SymbolKind::FIELD,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub name: String,
    pub kind: DeclarationKind,
    /// The whole declaration.
    pub range: Range,
    /// The declared name.
    pub selection_range: Range,
    pub detail: Option<String>,
    pub children: Vec<SymbolRecord>,
}

impl SymbolRecord {
    #[allow(deprecated)]
    pub fn to_lsp(&self) -> DocumentSymbol {
        DocumentSymbol {
            name: self.name.clone(),
            detail: self.detail.clone(),
            kind: self.kind.to_lsp(),
            tags: None,
            deprecated: None,
            range: super::to_lsp_range(self.range),
            selection_range: super::to_lsp_range(self.selection_range),
            children: if self.children.is_empty() {
                None
            } else {
                Some(self.children.iter().map(Self::to_lsp).collect())
            },
        }
    }
}

/// Builds the symbol hierarchy of `tree`, whose spans index into `text`.
///
/// Error nodes and their subtrees are skipped. Symbols whose span no longer
/// maps into `text` are dropped with a warning.
pub fn document_symbols(tree: &SyntaxTree, text: &Text) -> Vec<SymbolRecord> {
    let mut flat: Vec<(Option<usize>, SymbolRecord)> = Vec::new();
    let mut work: Vec<(NodeId, Option<usize>)> =
        tree.roots().map(|(id, _)| (id, None)).collect();
    work.reverse();

    while let Some((id, parent)) = work.pop() {
        let node = tree.node(id);
        let Some(kind) = DeclarationKind::of(&node.kind) else {
            continue;
        };
        let Some(record) = record_for(node, kind, text) else {
            continue;
        };

        let slot = flat.len();
        flat.push((parent, record));
        let mut children: Vec<_> = tree.children(id).map(|(child, _)| (child, Some(slot))).collect();
        children.reverse();
        work.extend(children);
    }

    // Parents precede their children in `flat`.
    let mut roots = Vec::new();
    while let Some((parent, mut record)) = flat.pop() {
        record.children.reverse();
        match parent.and_then(|slot| flat.get_mut(slot)) {
            Some((_, parent)) => parent.children.push(record),
            None => roots.push(record),
        }
    }
    roots.reverse();
    roots
}

fn record_for(node: &Node, kind: DeclarationKind, text: &Text) -> Option<SymbolRecord> {
    let name = node.name.as_ref()?;
    let range = text.span_to_range(node.span.clone());
    let selection_range = text.span_to_range(name.span.clone());
    match (range, selection_range) {
        (Ok(range), Ok(selection_range)) => Some(SymbolRecord {
            name: name.text.clone(),
            kind,
            range,
            selection_range,
            detail: detail_of(&node.kind, node.detail.as_deref()),
            children: Vec::new(),
        }),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("dropping symbol `{}`: {e}", name.text);
            None
        }
    }
}

fn detail_of(kind: &NodeKind, annotation: Option<&str>) -> Option<String> {
    match kind {
        NodeKind::Relation { role } => Some(format!("{} relation", role.as_str())),
        NodeKind::Rule { is_fact: true } => Some("fact".to_string()),
        NodeKind::Function { is_extern: true } => Some(match annotation {
            Some(ty) => format!("extern: {ty}"),
            None => "extern".to_string(),
        }),
        NodeKind::Typedef { is_extern: true } => Some("extern".to_string()),
        NodeKind::Import { alias: Some(alias), .. } => Some(format!("as {alias}")),
        _ => annotation.map(str::to_string),
    }
}
