//! Remote folder cache with request coalescing
//!
//! Maps `(parent remote id, local folder name)` to the remote folder id.
//! Concurrent callers asking for the same key share one find-or-create:
//! the first caller runs it, the rest wait on the same cell and reuse the
//! result. A failed creation leaves the key unresolved, so the next caller
//! (including one already waiting) runs its own attempt.
//!
//! Entries live for the lifetime of the cache and are never evicted.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use folderlift_core::domain::RemoteId;

type CacheKey = (RemoteId, String);

#[derive(Debug, Default)]
pub struct FolderCache {
    entries: DashMap<CacheKey, Arc<OnceCell<RemoteId>>>,
}

impl FolderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resolved id for a key, without waiting on in-flight work
    pub fn get(&self, parent: &RemoteId, name: &str) -> Option<RemoteId> {
        self.entries
            .get(&(parent.clone(), name.to_string()))
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves `(parent, name)`, running `create` only if no earlier or
    /// concurrent caller has resolved it
    ///
    /// The per-key wait covers only `create` itself; the map shard lock is
    /// released before anything is awaited.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        parent: &RemoteId,
        name: &str,
        create: F,
    ) -> Result<RemoteId, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RemoteId, E>>,
    {
        let cell = self
            .entries
            .entry((parent.clone(), name.to_string()))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(id) = cell.get() {
            debug!(parent = %parent, name, id = %id, "Folder cache hit");
            return Ok(id.clone());
        }

        cell.get_or_try_init(create).await.cloned()
    }
}
