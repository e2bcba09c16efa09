//! Workspace-wide symbol search over per-document outlines.

use super::symbols::{DeclarationKind, SymbolRecord};
use ddlog_core::Range;
use std::path::{Path, PathBuf};
use tower_lsp_server::ls_types::{Location, SymbolInformation, Uri};

/// A declaration matched by a workspace symbol query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSymbolRecord {
    pub path: PathBuf,
    pub name: String,
    pub kind: DeclarationKind,
    pub range: Range,
    /// Name of the enclosing declaration, for nested symbols.
    pub container: Option<String>,
}

impl WorkspaceSymbolRecord {
    #[allow(deprecated)]
    pub fn to_lsp(&self, uri: Uri) -> SymbolInformation {
        SymbolInformation {
            name: self.name.clone(),
            kind: self.kind.to_lsp(),
            tags: None,
            deprecated: None,
            location: Location {
                uri,
                range: super::to_lsp_range(self.range),
            },
            container_name: self.container.clone(),
        }
    }
}

/// Declarations of `path` whose names contain every whitespace-separated
/// pattern of `query`, in outline order. An empty query matches everything.
pub fn matching_symbols(
    path: &Path,
    records: &[SymbolRecord],
    query: &str,
) -> Vec<WorkspaceSymbolRecord> {
    let patterns: Vec<&str> = query.split_whitespace().collect();
    let mut matches = Vec::new();
    let mut work: Vec<(&SymbolRecord, Option<&str>)> =
        records.iter().rev().map(|record| (record, None)).collect();

    while let Some((record, container)) = work.pop() {
        if patterns
            .iter()
            .all(|pattern| record.name.contains(pattern))
        {
            matches.push(WorkspaceSymbolRecord {
                path: path.to_path_buf(),
                name: record.name.clone(),
                kind: record.kind,
                range: record.range,
                container: container.map(str::to_owned),
            });
        }
        work.extend(
            record
                .children
                .iter()
                .rev()
                .map(|child| (child, Some(record.name.as_str()))),
        );
    }
    matches
}
