//! Eagerly started, shared computations.
//!
//! [`EagerFuture`] spawns its work on the tokio runtime the moment it is
//! created, without waiting for anyone to poll it. Every clone of the handle
//! observes the same result and the work runs once no matter how many callers
//! await it. A caller that awaits after completion gets the stored value.
//!
//! [`FutureRegistry`] keys eager futures so bursts of identical requests
//! collapse into a single computation.

use crate::error::{CoreError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Cloneable handle to a computation that has already been started.
///
/// # Examples
///
/// ```
/// use ddlog_core::EagerFuture;
///
/// # tokio_test::block_on(async {
/// let future = EagerFuture::spawn(async { 6 * 7 });
/// let other = future.clone();
/// assert_eq!(future.await.unwrap(), 42);
/// assert_eq!(other.await.unwrap(), 42);
/// # });
/// ```
pub struct EagerFuture<T> {
    inner: Shared<BoxFuture<'static, Result<T>>>,
}

impl<T> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts `future` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let inner = handle
            .map(|joined| joined.map_err(|e| CoreError::TaskFailed(e.to_string())))
            .boxed()
            .shared();
        Self { inner }
    }

    /// An already-completed future holding `value`.
    pub fn ready(value: T) -> Self {
        Self {
            inner: futures::future::ready(Ok(value)).boxed().shared(),
        }
    }

    /// Returns the result if the computation has finished and some handle has
    /// observed it.
    pub fn peek(&self) -> Option<Result<T>> {
        self.inner.peek().cloned()
    }

    /// Waits for the shared result without consuming this handle.
    pub async fn join(&self) -> Result<T> {
        self.inner.clone().await
    }
}

impl<T> Clone for EagerFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Future for EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T: Clone> fmt::Debug for EagerFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerFuture")
            .field("done", &self.inner.peek().is_some())
            .finish_non_exhaustive()
    }
}

/// Keyed collection of eager futures.
///
/// At most one live computation exists per key. Entries stay registered after
/// completion so later joiners reuse the value; owners drop them with
/// [`cancel`](Self::cancel) or [`retain`](Self::retain) once the key is stale.
pub struct FutureRegistry<K, T> {
    entries: DashMap<K, EagerFuture<T>>,
    started: AtomicUsize,
}

impl<K, T> FutureRegistry<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            started: AtomicUsize::new(0),
        }
    }

    /// Returns the live handle for `key`, or starts `work()` and registers it.
    ///
    /// `work` runs at most once per registration, even under concurrent
    /// submits of the same key.
    ///
    /// # Panics
    ///
    /// Panics when a new computation must be started outside a tokio runtime.
    pub fn submit<F, Fut>(&self, key: K, work: F) -> EagerFuture<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                tracing::trace!(key = ?entry.key(), "starting shared computation");
                self.started.fetch_add(1, Ordering::Relaxed);
                let future = EagerFuture::spawn(work());
                entry.insert(future.clone());
                future
            }
        }
    }

    /// Waits for a handle returned by [`submit`](Self::submit).
    pub async fn join(&self, handle: &EagerFuture<T>) -> Result<T> {
        handle.join().await
    }

    pub fn get(&self, key: &K) -> Option<EagerFuture<T>> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Unregisters `key` so the next submit starts fresh work.
    ///
    /// Work already in flight is not aborted and existing handles still
    /// resolve to its result. Returns whether an entry was removed.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            tracing::trace!(?key, "cancelled shared computation");
        }
        removed
    }

    /// Keeps only entries whose key satisfies `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of computations started since creation.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }
}

impl<K, T> Default for FutureRegistry<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for FutureRegistry<K, T>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureRegistry")
            .field("entries", &self.entries.len())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_work_starts_before_first_poll() {
        let (tx, rx) = oneshot::channel();
        let future = EagerFuture::spawn(async move {
            let _ = tx.send(());
            1
        });
        // Nobody has polled `future` yet.
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("work should start eagerly")
            .unwrap();
        assert_eq!(future.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_late_joiner_gets_stored_value() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let future = EagerFuture::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            "tree".to_string()
        });

        assert_eq!(future.join().await.unwrap(), "tree");
        assert!(future.peek().is_some());
        assert_eq!(future.clone().await.unwrap(), "tree");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_future() {
        let future = EagerFuture::ready(5_u32);
        assert_eq!(future.join().await, Ok(5));
    }

    fn explode() -> u32 {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_work_reports_task_failed() {
        let future = EagerFuture::spawn(async { explode() });
        let first = future.join().await;
        let second = future.join().await;
        assert!(matches!(first, Err(CoreError::TaskFailed(_))));
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_run_once() {
        let registry = Arc::new(FutureRegistry::<&'static str, u64>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            let runs = Arc::clone(&runs);
            tasks.push(tokio::spawn(async move {
                let handle = registry.submit("symbols", move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    42
                });
                registry.join(&handle).await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(42));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(registry.started(), 1);
    }

    #[tokio::test]
    async fn test_cancel_is_advisory() {
        let registry = FutureRegistry::<u32, &'static str>::new();
        let (release, gate) = oneshot::channel::<()>();

        let first = registry.submit(1, move || async move {
            let _ = gate.await;
            "original"
        });
        assert!(registry.cancel(&1));
        assert!(!registry.cancel(&1));

        let second = registry.submit(1, || async { "fresh" });
        assert_eq!(registry.started(), 2);

        release.send(()).unwrap();
        assert_eq!(first.await, Ok("original"));
        assert_eq!(second.await, Ok("fresh"));
    }

    #[tokio::test]
    async fn test_retain_drops_stale_keys() {
        let registry = FutureRegistry::<(u32, u64), u64>::new();
        for version in 0..3 {
            registry.submit((7, version), move || async move { version });
        }
        registry.retain(|(_, version)| *version == 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&(7, 2)).is_some());
        assert!(registry.get(&(7, 0)).is_none());
    }
}
