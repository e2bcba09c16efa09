use crate::config::DdlogConfig;
use crate::document::{
    Document, DocumentOrigin, DocumentSnapshot, DocumentState, is_ddlog_path,
    load_document_from_disk, schedule_parse,
};
use crate::error::{LspError, Result};
use crate::handlers::symbols::SymbolRecord;
use crate::imports::ImportCache;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ddlog_core::{FutureRegistry, Text, TextEdit};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared document-symbol computations, keyed by document path and version.
pub type SymbolRegistry = FutureRegistry<(PathBuf, u64), Arc<Vec<SymbolRecord>>>;

/// A workspace folder registered by the client.
///
/// Folders are ordered by root, so a folder set iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkspaceFolder {
    pub root: PathBuf,
    pub name: String,
}

/// Process-wide registry of workspace folders and documents.
///
/// At most one [`Document`] exists per normalized path: every insertion goes
/// through the `DashMap` entry API. Documents that are neither open in the
/// editor nor imported by another document are evicted by [`sweep`](Self::sweep).
///
/// # Examples
///
/// ```
/// use ddlog_lsp::session::Session;
///
/// let session = Session::new();
/// assert_eq!(session.document_count(), 0);
/// assert!(session.folders().is_empty());
/// ```
#[derive(Debug)]
pub struct Session {
    folders: RwLock<BTreeSet<WorkspaceFolder>>,
    documents: DashMap<PathBuf, Arc<Document>>,
    imports: ImportCache,
    symbols: SymbolRegistry,
    config: RwLock<Arc<DdlogConfig>>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(DdlogConfig::default())
    }

    pub fn with_config(config: DdlogConfig) -> Self {
        Self {
            folders: RwLock::new(BTreeSet::new()),
            documents: DashMap::new(),
            imports: ImportCache::new(),
            symbols: SymbolRegistry::new(),
            config: RwLock::new(Arc::new(config)),
        }
    }

    pub fn config(&self) -> Arc<DdlogConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the configuration. Import resolutions depend on it, so the
    /// import cache is cleared.
    pub fn set_config(&self, config: DdlogConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        self.imports.clear();
        tracing::info!("configuration updated");
    }

    pub fn imports(&self) -> &ImportCache {
        &self.imports
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn document(&self, path: &Path) -> Option<Arc<Document>> {
        self.documents
            .get(&normalize_path(path))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(&normalize_path(path))
    }

    /// Paths of every known document, sorted.
    pub fn known_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .documents
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn folders(&self) -> Vec<WorkspaceFolder> {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Innermost registered folder containing `path`.
    pub fn folder_for(&self, path: &Path) -> Option<WorkspaceFolder> {
        let path = normalize_path(path);
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|folder| path.starts_with(&folder.root))
            .max_by_key(|folder| folder.root.components().count())
            .cloned()
    }

    /// Registers a folder, replacing any folder with the same root.
    pub fn add_folder(&self, root: PathBuf, name: String) {
        let root = normalize_path(&root);
        {
            let mut folders = self.folders.write().unwrap_or_else(PoisonError::into_inner);
            folders.retain(|folder| folder.root != root);
            folders.insert(WorkspaceFolder {
                root: root.clone(),
                name,
            });
        }
        self.imports.clear();
        tracing::info!("workspace folder added: {}", root.display());
    }

    /// Unregisters a folder and evicts the closed documents that lived only
    /// under it. Documents still open in the editor stay as untracked files.
    ///
    /// Returns whether the folder was registered.
    pub fn remove_folder(&self, root: &Path) -> bool {
        let root = normalize_path(root);
        let remaining = {
            let mut folders = self.folders.write().unwrap_or_else(PoisonError::into_inner);
            let before = folders.len();
            folders.retain(|folder| folder.root != root);
            if folders.len() == before {
                return false;
            }
            folders.clone()
        };

        let orphaned: Vec<PathBuf> = self
            .documents
            .iter()
            .filter(|entry| {
                let path = entry.key();
                path.starts_with(&root)
                    && !remaining.iter().any(|folder| path.starts_with(&folder.root))
                    && entry.value().state() == DocumentState::Closed
            })
            .map(|entry| entry.key().clone())
            .collect();
        for path in &orphaned {
            self.evict(path);
        }

        self.imports.clear();
        self.sweep();
        tracing::info!(
            evicted = orphaned.len(),
            "workspace folder removed: {}",
            root.display()
        );
        true
    }

    /// Opens `path` in the editor, creating the document or replacing the
    /// text of a known one, and schedules a parse. Returns the new version.
    ///
    /// # Errors
    ///
    /// `LspError::UnsupportedLanguage` unless `path` is a `.dl` file.
    pub fn open(&self, path: &Path, text: &str, client_version: Option<i32>) -> Result<u64> {
        let path = normalize_path(path);
        if !is_ddlog_path(&path) {
            return Err(LspError::UnsupportedLanguage(path.display().to_string()));
        }

        let text = Text::new(text);
        let (document, version, created) = match self.documents.entry(path.clone()) {
            Entry::Occupied(entry) => {
                let document = Arc::clone(entry.get());
                let version = document.reopen(text.clone(), client_version);
                (document, version, false)
            }
            Entry::Vacant(entry) => {
                let document = Arc::new(Document::new(
                    path.clone(),
                    text.clone(),
                    DocumentOrigin::Editor,
                    client_version,
                ));
                entry.insert(Arc::clone(&document));
                (document, 0, true)
            }
        };

        schedule_parse(&document, version, text);
        self.imports.invalidate_document(&path);
        if created {
            self.imports.document_created(&path);
        }
        self.symbols.retain(|(p, _)| p != &path);
        tracing::debug!(path = %path.display(), version, created, "document opened");
        Ok(version)
    }

    /// Applies one batch of edits and schedules a reparse. Returns the new
    /// version.
    ///
    /// # Errors
    ///
    /// - `LspError::UnknownDocument` - `path` was never opened or loaded
    /// - `LspError::DocumentNotOpen` - the document is closed
    /// - `LspError::Core` - an edit range is out of bounds
    pub fn change(
        &self,
        path: &Path,
        edits: &[TextEdit],
        client_version: Option<i32>,
    ) -> Result<u64> {
        let path = normalize_path(path);
        let document = self
            .document(&path)
            .ok_or_else(|| LspError::UnknownDocument(path.clone()))?;

        let version = document.apply_edits(edits, client_version)?;
        let snapshot = document.snapshot();
        schedule_parse(&document, snapshot.version, snapshot.text.clone());

        self.imports.invalidate_document(&path);
        self.symbols.retain(|(p, v)| p != &path || *v >= version);
        Ok(version)
    }

    /// Closes `path` in the editor. The document stays available until
    /// nothing imports it.
    ///
    /// # Errors
    ///
    /// `LspError::UnknownDocument` if `path` is not known.
    pub fn close(&self, path: &Path) -> Result<()> {
        let path = normalize_path(path);
        let document = self
            .document(&path)
            .ok_or_else(|| LspError::UnknownDocument(path.clone()))?;
        document.close();
        self.sweep();
        Ok(())
    }

    /// Snapshot of `path` whose tree matches its text, waiting for an
    /// in-flight parse if needed.
    ///
    /// Returns `None` for unknown documents. If the parse task fails, the last
    /// available snapshot is returned and may lack a current tree.
    pub async fn parsed_snapshot(&self, path: &Path) -> Option<Arc<DocumentSnapshot>> {
        let document = self.document(path)?;
        let snapshot = document.snapshot();
        if snapshot.is_current() {
            return Some(snapshot);
        }

        let pending = document
            .pending_parse()
            .unwrap_or_else(|| schedule_parse(&document, snapshot.version, snapshot.text.clone()));
        if let Err(e) = pending.join().await {
            tracing::warn!("parse of {} failed: {e}", path.display());
        }
        Some(document.snapshot())
    }

    /// Loads an unopened `.dl` file as a closed document that is evicted once
    /// nothing imports it. Returns the known document if one exists.
    ///
    /// # Errors
    ///
    /// - `LspError::UnsupportedLanguage` - not a `.dl` file
    /// - `LspError::FileTooLarge` / `LspError::Io` - the file cannot be read
    pub async fn load_from_disk(&self, path: &Path) -> Result<Arc<Document>> {
        let path = normalize_path(path);
        if let Some(document) = self.document(&path) {
            return Ok(document);
        }
        if !is_ddlog_path(&path) {
            return Err(LspError::UnsupportedLanguage(path.display().to_string()));
        }

        let max_size = self.config().imports.max_file_size;
        let content = load_document_from_disk(&path, max_size).await?;

        let document = match self.documents.entry(path.clone()) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let document = Arc::new(Document::new(
                    path.clone(),
                    Text::new(&content),
                    DocumentOrigin::Disk,
                    None,
                ));
                entry.insert(Arc::clone(&document));
                document
            }
        };

        self.imports.document_created(&path);
        schedule_parse(&document, 0, document.snapshot().text.clone());
        tracing::debug!(path = %path.display(), "import target loaded from disk");
        Ok(document)
    }

    /// Evicts closed documents that no other document imports, repeating
    /// until nothing more can go. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        let mut evicted = 0;
        loop {
            let candidates: Vec<PathBuf> = self
                .documents
                .iter()
                .filter(|entry| is_evictable(entry.value()))
                .map(|entry| entry.key().clone())
                .collect();

            let mut progressed = false;
            for path in candidates {
                if self.imports.is_referenced(&path) {
                    continue;
                }
                if self.evict(&path) {
                    evicted += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        if evicted > 0 {
            tracing::debug!(evicted, "swept unreferenced documents");
        }
        evicted
    }

    fn evict(&self, path: &Path) -> bool {
        let removed = self
            .documents
            .remove_if(path, |_, document| document.state() == DocumentState::Closed)
            .is_some();
        if removed {
            self.imports.drop_importer(path);
            self.symbols.retain(|(p, _)| p != path);
            tracing::debug!(path = %path.display(), "document evicted");
        }
        removed
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn is_evictable(document: &Document) -> bool {
    document.state() == DocumentState::Closed && document.is_marked_for_eviction()
}

/// Lexically normalizes `path`: drops `.` components and folds `..` into
/// the preceding component. Symlinks are not resolved.
///
/// # Examples
///
/// ```
/// use ddlog_lsp::session::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     normalize_path(Path::new("/ws/src/../lib/./graph.dl")),
///     PathBuf::from("/ws/lib/graph.dl")
/// );
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }
    normalized
}
