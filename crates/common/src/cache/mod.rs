//! Immutable table cache
//!
//! Provides:
//! - Load-once, serve-many access to `Arc`-shared tables
//! - Atomic replacement: readers holding the old `Arc` finish against it
//! - Explicit invalidation when a model or backend version changes

use crate::errors::Result;
use crate::metrics;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Keyed cache of immutable tables
pub struct TableCache<T> {
    name: &'static str,
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> TableCache<T> {
    /// Create an empty cache; `name` labels log lines and metrics
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a cached table
    pub async fn get(&self, key: &str) -> Option<Arc<T>> {
        let hit = self.entries.read().await.get(key).cloned();
        metrics::record_cache(hit.is_some(), self.name);
        hit
    }

    /// Get a cached table or load and cache it.
    ///
    /// Concurrent misses may each run the loader; the last one wins, and
    /// every caller gets a complete table.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = Arc::new(loader().await?);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Arc::clone(&value));

        debug!(cache = self.name, key, "Table cached");
        Ok(value)
    }

    /// Swap in a new table, returning the previous one
    pub async fn replace(&self, key: &str, value: T) -> Option<Arc<T>> {
        let previous = self
            .entries
            .write()
            .await
            .insert(key.to_string(), Arc::new(value));
        debug!(cache = self.name, key, replaced = previous.is_some(), "Table replaced");
        previous
    }

    /// Drop one table so the next access reloads it
    pub async fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.write().await.remove(key).is_some();
        debug!(cache = self.name, key, removed, "Table invalidated");
        removed
    }

    /// Keys currently cached
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_loads_once() {
        let cache: TableCache<Vec<u32>> = TableCache::new("test");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let table = cache
                .get_or_load("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(table.len(), 3);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replace_keeps_old_reader_alive() {
        let cache: TableCache<&'static str> = TableCache::new("test");
        cache.replace("k", "old").await;

        let in_flight = cache.get("k").await.unwrap();
        let previous = cache.replace("k", "new").await.unwrap();

        assert_eq!(*in_flight, "old");
        assert_eq!(*previous, "old");
        assert_eq!(*cache.get("k").await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache: TableCache<u8> = TableCache::new("test");
        cache.get_or_load("k", || async { Ok(1) }).await.unwrap();
        assert!(cache.invalidate("k").await);
        assert!(!cache.invalidate("k").await);

        let reloaded = cache.get_or_load("k", || async { Ok(2) }).await.unwrap();
        assert_eq!(*reloaded, 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache: TableCache<u8> = TableCache::new("test");
        let err = cache
            .get_or_load("k", || async {
                Err(crate::errors::AppError::ArtifactNotFound { table: "k".into() })
            })
            .await;
        assert!(err.is_err());
        assert!(cache.keys().await.is_empty());
    }
}
