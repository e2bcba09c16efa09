use crate::error::{LspError, Result};
use ddlog_core::{EagerFuture, SyntaxTree, Text, TextEdit};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a document.
///
/// ```text
///            edit              parse starts
///  Opened ─────────▶ Stale ─────────────────▶ Parsing
///    ▲                 ▲  edit                  │
///    │                 └────────────────────────┤
///    └──────────── parse completes (current) ───┘
///  any ── close ──▶ Closed ── reopen ──▶ Opened
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// Tree matches the text (or its parse is in flight right after open).
    Opened,
    /// Not open in the editor; kept read-only for fallback queries.
    Closed,
    /// A parse of the current version is running.
    Parsing,
    /// Text changed after the last tree was produced.
    Stale,
}

/// How a document entered the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// Opened by the editor.
    Editor,
    /// Loaded from disk as an import target.
    Disk,
}

/// Result of handing a finished parse back to its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Applied,
    /// The parse was for an older version and was dropped.
    Discarded { current: u64 },
}

/// Immutable view of a document at one version.
///
/// The tree may lag behind the text while a reparse is in flight;
/// [`is_current`](Self::is_current) tells whether they agree.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub version: u64,
    pub client_version: Option<i32>,
    pub text: Text,
    pub tree: Option<Arc<SyntaxTree>>,
    pub tree_version: Option<u64>,
}

impl DocumentSnapshot {
    pub fn is_current(&self) -> bool {
        self.tree.is_some() && self.tree_version == Some(self.version)
    }
}

struct Inner {
    state: DocumentState,
    origin: DocumentOrigin,
    marked_for_eviction: bool,
    snapshot: Arc<DocumentSnapshot>,
    pending: Option<(u64, EagerFuture<Arc<SyntaxTree>>)>,
}

/// One DDlog file known to the session.
///
/// All transitions go through a short synchronous critical section; the lock
/// is never held across an `.await`. Readers take [`DocumentSnapshot`]s.
pub struct Document {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl Document {
    pub fn new(
        path: PathBuf,
        text: Text,
        origin: DocumentOrigin,
        client_version: Option<i32>,
    ) -> Self {
        let (state, marked_for_eviction) = match origin {
            DocumentOrigin::Editor => (DocumentState::Opened, false),
            DocumentOrigin::Disk => (DocumentState::Closed, true),
        };
        Self {
            path,
            inner: Mutex::new(Inner {
                state,
                origin,
                marked_for_eviction,
                snapshot: Arc::new(DocumentSnapshot {
                    version: 0,
                    client_version,
                    text,
                    tree: None,
                    tree_version: None,
                }),
                pending: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<DocumentSnapshot> {
        Arc::clone(&self.lock().snapshot)
    }

    pub fn state(&self) -> DocumentState {
        self.lock().state
    }

    pub fn version(&self) -> u64 {
        self.lock().snapshot.version
    }

    pub fn origin(&self) -> DocumentOrigin {
        self.lock().origin
    }

    pub fn is_marked_for_eviction(&self) -> bool {
        self.lock().marked_for_eviction
    }

    /// Replaces the whole text of a known document that the editor opens
    /// again. Returns the new version.
    pub fn reopen(&self, text: Text, client_version: Option<i32>) -> u64 {
        let mut inner = self.lock();
        let version = inner.snapshot.version + 1;
        inner.snapshot = Arc::new(DocumentSnapshot {
            version,
            client_version,
            text,
            tree: inner.snapshot.tree.clone(),
            tree_version: inner.snapshot.tree_version,
        });
        inner.state = DocumentState::Opened;
        inner.origin = DocumentOrigin::Editor;
        inner.marked_for_eviction = false;
        tracing::debug!(path = %self.path.display(), version, "document reopened");
        version
    }

    /// Applies `edits` in order as one batch and returns the new version.
    ///
    /// Either every edit applies or the document is left untouched.
    pub fn apply_edits(&self, edits: &[TextEdit], client_version: Option<i32>) -> Result<u64> {
        let mut inner = self.lock();
        if inner.state == DocumentState::Closed {
            return Err(LspError::DocumentNotOpen(self.path.clone()));
        }

        let text = inner.snapshot.text.apply_edits(edits)?;
        let version = inner.snapshot.version + 1;
        inner.snapshot = Arc::new(DocumentSnapshot {
            version,
            client_version: client_version.or(inner.snapshot.client_version),
            text,
            tree: inner.snapshot.tree.clone(),
            tree_version: inner.snapshot.tree_version,
        });
        inner.state = DocumentState::Stale;
        tracing::debug!(
            path = %self.path.display(),
            version,
            edits = edits.len(),
            "document edited"
        );
        Ok(version)
    }

    /// Marks the document closed and eligible for eviction. The last tree
    /// stays available to read-only queries.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.state = DocumentState::Closed;
        inner.marked_for_eviction = true;
        tracing::debug!(path = %self.path.display(), "document closed");
    }

    /// Called by the parse task when it starts. Moves a stale document to
    /// `Parsing` if `version` is still current.
    pub fn begin_parse(&self, version: u64) -> bool {
        let mut inner = self.lock();
        if inner.snapshot.version != version {
            return false;
        }
        if inner.state == DocumentState::Stale {
            inner.state = DocumentState::Parsing;
        }
        true
    }

    /// Installs a finished parse.
    ///
    /// Parses of older versions are discarded. A version newer than the
    /// document's own can only come from a bookkeeping bug.
    pub fn complete_parse(&self, version: u64, tree: Arc<SyntaxTree>) -> Result<ParseOutcome> {
        let mut inner = self.lock();
        let current = inner.snapshot.version;

        if version > current {
            return Err(LspError::InternalInvariantViolation(format!(
                "parse for version {version} of {} completed but current version is {current}",
                self.path.display()
            )));
        }
        if version < current {
            tracing::debug!(
                path = %self.path.display(),
                version,
                current,
                "discarding superseded parse"
            );
            return Ok(ParseOutcome::Discarded { current });
        }

        inner.snapshot = Arc::new(DocumentSnapshot {
            version,
            client_version: inner.snapshot.client_version,
            text: inner.snapshot.text.clone(),
            tree: Some(tree),
            tree_version: Some(version),
        });
        if matches!(inner.state, DocumentState::Stale | DocumentState::Parsing) {
            inner.state = DocumentState::Opened;
        }
        if inner.pending.as_ref().is_some_and(|(v, _)| *v <= version) {
            inner.pending = None;
        }
        Ok(ParseOutcome::Applied)
    }

    pub(crate) fn set_pending_parse(&self, version: u64, future: EagerFuture<Arc<SyntaxTree>>) {
        let mut inner = self.lock();
        let tree_applied = inner.snapshot.tree_version == Some(version);
        if version == inner.snapshot.version && !tree_applied {
            inner.pending = Some((version, future));
        }
    }

    /// In-flight parse of the current version, if any.
    pub fn pending_parse(&self) -> Option<EagerFuture<Arc<SyntaxTree>>> {
        let inner = self.lock();
        inner
            .pending
            .as_ref()
            .filter(|(version, _)| *version == inner.snapshot.version)
            .map(|(_, future)| future.clone())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("state", &inner.state)
            .field("origin", &inner.origin)
            .field("version", &inner.snapshot.version)
            .field("tree_version", &inner.snapshot.tree_version)
            .field("marked_for_eviction", &inner.marked_for_eviction)
            .finish()
    }
}
