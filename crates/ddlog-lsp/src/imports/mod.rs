//! Import graph: extraction, resolution, and memoization.
//!
//! - `cache`: per-version memo of direct resolutions with targeted invalidation
//! - `resolver`: the search order and the transitive cycle walk

mod cache;
mod resolver;

pub use cache::ImportCache;
pub use resolver::{resolve_direct, resolve_graph};

use crate::error::LspError;
use ddlog_core::ModulePath;
use ddlog_core::syntax::{NodeKind, SyntaxTree};
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An `import` declaration as written in the importing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: ModulePath,
    pub alias: Option<String>,
    /// Byte span of the whole declaration.
    pub span: Range<usize>,
    /// Byte span of the module path.
    pub path_span: Range<usize>,
}

/// Why an import has no single target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("no module file found")]
    Unresolved,
    #[error("{} candidate module files", .candidates.len())]
    Ambiguous { candidates: Vec<PathBuf> },
    /// The import participates in a cycle; `cycle` starts and ends at the
    /// same document.
    #[error("import cycle of length {}", .cycle.len().saturating_sub(1))]
    Cyclic { cycle: Vec<PathBuf> },
}

/// An import bound to its target document, or the reason it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub import: Import,
    pub outcome: Result<PathBuf, ImportError>,
}

impl ResolvedImport {
    /// Document the import points at. An import on a cycle still points at
    /// the next document of its cycle.
    pub fn target(&self) -> Option<&Path> {
        match &self.outcome {
            Ok(path) => Some(path),
            Err(ImportError::Cyclic { cycle }) => cycle.get(1).map(PathBuf::as_path),
            Err(_) => None,
        }
    }

    /// The failure as a reportable error, if resolution failed.
    pub fn error(&self) -> Option<LspError> {
        let module = self.import.module.clone();
        match &self.outcome {
            Ok(_) => None,
            Err(ImportError::Unresolved) => Some(LspError::UnresolvedImport { module }),
            Err(ImportError::Ambiguous { candidates }) => Some(LspError::AmbiguousImport {
                module,
                candidates: candidates.clone(),
            }),
            Err(ImportError::Cyclic { cycle }) => Some(LspError::CyclicImport {
                module,
                cycle: cycle.clone(),
            }),
        }
    }
}

/// Top-level imports of `tree`, in source order.
pub fn extract_imports(tree: &SyntaxTree) -> Vec<Import> {
    tree.imports()
        .filter_map(|node| {
            let NodeKind::Import { segments, alias } = &node.kind else {
                return None;
            };
            let name = node.name.as_ref()?;
            match ModulePath::from_segments(segments.clone()) {
                Ok(module) => Some(Import {
                    module,
                    alias: alias.clone(),
                    span: node.span.clone(),
                    path_span: name.span.clone(),
                }),
                Err(e) => {
                    tracing::warn!("skipping import: {e}");
                    None
                }
            }
        })
        .collect()
}
