use super::ImportError;
use dashmap::DashMap;
use ddlog_core::ModulePath;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

type Outcome = Result<PathBuf, ImportError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    importer: PathBuf,
    version: u64,
    module: ModulePath,
}

/// Memo of direct import resolutions, keyed by
/// `(importing document, importing version, module path)`.
///
/// Entries are dropped selectively: a change to one document removes only the
/// entries that name it as importer, target, or ambiguous candidate.
#[derive(Debug, Default)]
pub struct ImportCache {
    entries: DashMap<CacheKey, Outcome>,
    resolutions: AtomicUsize,
}

impl ImportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, importer: &Path, version: u64, module: &ModulePath) -> Option<Outcome> {
        let key = CacheKey {
            importer: importer.to_path_buf(),
            version,
            module: module.clone(),
        };
        self.entries.get(&key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, importer: &Path, version: u64, module: &ModulePath, outcome: Outcome) {
        let key = CacheKey {
            importer: importer.to_path_buf(),
            version,
            module: module.clone(),
        };
        self.entries.insert(key, outcome);
    }

    /// Counts one resolution that actually ran the search.
    pub fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of searches run since creation.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Drops every entry that references `path`, as importer or as target.
    pub fn invalidate_document(&self, path: &Path) {
        let before = self.entries.len();
        self.entries
            .retain(|key, outcome| key.importer != path && !outcome_mentions(outcome, path));
        tracing::trace!(
            path = %path.display(),
            dropped = before.saturating_sub(self.entries.len()),
            "import cache invalidated"
        );
    }

    /// Drops entries whose module file name matches a newly known document,
    /// so imports that could now resolve to it are searched again.
    pub fn document_created(&self, path: &Path) {
        let Some(file_name) = path.file_name() else {
            return;
        };
        self.entries
            .retain(|key, _| key.module.file_name().as_str() != file_name);
    }

    /// Drops the entries `path` owns as importer.
    pub fn drop_importer(&self, path: &Path) {
        self.entries.retain(|key, _| key.importer != path);
    }

    /// True if another document's cached resolution points at `path`.
    pub fn is_referenced(&self, path: &Path) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.key().importer != path && outcome_mentions(entry.value(), path))
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn outcome_mentions(outcome: &Outcome, path: &Path) -> bool {
    match outcome {
        Ok(target) => target == path,
        Err(ImportError::Ambiguous { candidates }) => candidates.iter().any(|c| c == path),
        Err(ImportError::Unresolved | ImportError::Cyclic { .. }) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(text: &str) -> ModulePath {
        ModulePath::parse(text).unwrap()
    }

    #[test]
    fn test_get_is_keyed_by_version() {
        let cache = ImportCache::new();
        let a = Path::new("/ws/a.dl");
        cache.insert(a, 1, &module("b"), Ok("/ws/b.dl".into()));

        assert_eq!(cache.get(a, 1, &module("b")), Some(Ok("/ws/b.dl".into())));
        assert_eq!(cache.get(a, 2, &module("b")), None);
        assert_eq!(cache.get(a, 1, &module("c")), None);
    }

    #[test]
    fn test_invalidate_document_is_targeted() {
        let cache = ImportCache::new();
        let a = Path::new("/ws/a.dl");
        let c = Path::new("/ws/c.dl");
        cache.insert(a, 0, &module("b"), Ok("/ws/b.dl".into()));
        cache.insert(c, 0, &module("d"), Ok("/ws/d.dl".into()));
        cache.insert(
            c,
            0,
            &module("e"),
            Err(ImportError::Ambiguous {
                candidates: vec!["/ws/b.dl".into(), "/ws/lib/b.dl".into()],
            }),
        );

        cache.invalidate_document(Path::new("/ws/b.dl"));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(c, 0, &module("d")).is_some());
    }

    #[test]
    fn test_document_created_drops_matching_modules() {
        let cache = ImportCache::new();
        let a = Path::new("/ws/a.dl");
        cache.insert(a, 0, &module("b"), Err(ImportError::Unresolved));
        cache.insert(a, 0, &module("lib::b"), Err(ImportError::Unresolved));
        cache.insert(a, 0, &module("c"), Err(ImportError::Unresolved));

        cache.document_created(Path::new("/ws/b.dl"));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(a, 0, &module("c")).is_some());
    }

    #[test]
    fn test_is_referenced_ignores_own_entries() {
        let cache = ImportCache::new();
        let a = Path::new("/ws/a.dl");
        cache.insert(a, 0, &module("a"), Ok(a.to_path_buf()));
        assert!(!cache.is_referenced(a));

        cache.insert(Path::new("/ws/z.dl"), 0, &module("a"), Ok(a.to_path_buf()));
        assert!(cache.is_referenced(a));

        cache.drop_importer(Path::new("/ws/z.dl"));
        assert!(!cache.is_referenced(a));
    }

    #[test]
    fn test_resolution_counter() {
        let cache = ImportCache::new();
        assert_eq!(cache.resolution_count(), 0);
        cache.record_resolution();
        cache.record_resolution();
        assert_eq!(cache.resolution_count(), 2);
    }
}
