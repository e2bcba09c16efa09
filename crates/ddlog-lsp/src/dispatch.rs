//! Boundary façade over the session.
//!
//! Mutations return `Result<_, BoundaryError>` with stable codes. Read-only
//! queries never fail: unknown documents and broken imports degrade to empty
//! or partial results, logged at `warn`. Failures reported inside results
//! (syntax errors, failed imports) are mapped to their codes here too.

use crate::document::DocumentSnapshot;
use crate::error::{BoundaryError, LocatedError, LspError};
use crate::handlers::definition::{DefinitionTarget, import_definition};
use crate::handlers::diagnostics::document_diagnostics;
use crate::handlers::symbols::{SymbolRecord, document_symbols};
use crate::handlers::workspace_symbols::{WorkspaceSymbolRecord, matching_symbols};
use crate::imports::{ResolvedImport, resolve_graph};
use ddlog_core::syntax::NodeKind;
use crate::session::{Session, normalize_path};
use ddlog_core::{Position, TextEdit};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp_server::ls_types::Diagnostic;

pub struct Dispatcher {
    session: Arc<Session>,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn open_document(
        &self,
        path: &Path,
        text: &str,
        client_version: Option<i32>,
    ) -> Result<u64, BoundaryError> {
        Ok(self.session.open(path, text, client_version)?)
    }

    pub fn change_document(
        &self,
        path: &Path,
        client_version: Option<i32>,
        edits: &[TextEdit],
    ) -> Result<u64, BoundaryError> {
        Ok(self.session.change(path, edits, client_version)?)
    }

    pub fn close_document(&self, path: &Path) -> Result<(), BoundaryError> {
        Ok(self.session.close(path)?)
    }

    pub fn add_workspace_folder(&self, root: PathBuf, name: String) {
        self.session.add_folder(root, name);
    }

    pub fn remove_workspace_folder(&self, root: &Path) -> bool {
        self.session.remove_folder(root)
    }

    /// Outline of `path`. Concurrent requests for one document version share
    /// a single computation.
    pub async fn query_symbols(&self, path: &Path) -> Arc<Vec<SymbolRecord>> {
        let path = normalize_path(path);
        let Some(snapshot) = self.session.parsed_snapshot(&path).await else {
            tracing::warn!("symbols requested for unknown document {}", path.display());
            return Arc::default();
        };

        let handle = self
            .session
            .symbols()
            .submit((path.clone(), snapshot.version), move || async move {
                let symbols = snapshot
                    .tree
                    .as_ref()
                    .map(|tree| document_symbols(tree, &snapshot.text))
                    .unwrap_or_default();
                Arc::new(symbols)
            });

        match self.session.symbols().join(&handle).await {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::warn!("symbol computation for {} failed: {e}", path.display());
                Arc::default()
            }
        }
    }

    /// Direct imports of `path` in source order, with cycle membership
    /// computed over the transitive import graph.
    pub async fn query_resolved_imports(&self, path: &Path) -> Vec<ResolvedImport> {
        let path = normalize_path(path);
        if !self.session.contains(&path) {
            tracing::warn!("imports requested for unknown document {}", path.display());
            return Vec::new();
        }

        let mut graph = resolve_graph(&self.session, &path).await;
        self.session.sweep();
        graph.remove(&path).unwrap_or_default()
    }

    /// Failed imports of `path` at their module paths, with boundary codes.
    pub async fn query_import_failures(&self, path: &Path) -> Vec<LocatedError> {
        import_failures(&self.query_resolved_imports(path).await)
    }

    pub async fn query_diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        let imports = self.query_import_failures(path).await;
        let Some(snapshot) = self.session.parsed_snapshot(path).await else {
            return Vec::new();
        };
        let config = self.session.config();
        document_diagnostics(
            &snapshot.text,
            &parse_failures(&snapshot),
            &imports,
            &config.diagnostics,
        )
    }

    /// Declarations of every known document whose names contain each
    /// whitespace-separated pattern of `query`. Outlines come from the shared
    /// symbol computations.
    pub async fn query_workspace_symbols(&self, query: &str) -> Vec<WorkspaceSymbolRecord> {
        let mut matches = Vec::new();
        for path in self.session.known_paths() {
            let symbols = self.query_symbols(&path).await;
            matches.extend(matching_symbols(&path, &symbols, query));
        }
        tracing::debug!(query, matches = matches.len(), "workspace symbol search");
        matches
    }

    pub async fn query_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Option<DefinitionTarget> {
        let imports = self.query_resolved_imports(path).await;
        let snapshot = self.session.parsed_snapshot(path).await?;
        import_definition(&snapshot, &imports, position)
    }
}

fn parse_failures(snapshot: &DocumentSnapshot) -> Vec<LocatedError> {
    let Some(tree) = &snapshot.tree else {
        return Vec::new();
    };
    tree.errors()
        .filter_map(|node| match &node.kind {
            NodeKind::Error { message } => Some(LocatedError {
                span: node.span.clone(),
                error: LspError::ParseFailure {
                    message: message.clone(),
                }
                .into(),
            }),
            _ => None,
        })
        .collect()
}

fn import_failures(imports: &[ResolvedImport]) -> Vec<LocatedError> {
    imports
        .iter()
        .filter_map(|resolved| {
            Some(LocatedError {
                span: resolved.import.path_span.clone(),
                error: resolved.error()?.into(),
            })
        })
        .collect()
}
