//! Bounded cache of loaded snapshot graphs.
//!
//! Queries against the same snapshot should not reload it from storage every
//! time, but memory is bounded: a fixed-capacity LRU holds shared immutable
//! graph references keyed by snapshot id. Loading is single-flight per id,
//! so concurrent misses for one snapshot perform exactly one load, and a
//! graph is published to the cache only after it is fully built.

use crate::error::Result;
use crate::graph::Graph;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of cached graphs.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CACHE_CAPACITY) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// LRU cache of `snapshot id -> Arc<Graph>` with single-flight loading.
pub struct GraphCache {
    entries: Mutex<LruCache<String, Arc<Graph>>>,
    /// Per-snapshot-id load locks; entries are removed once a load settles.
    loading: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GraphCache {
    /// Create a cache with the given capacity. `capacity == 0` falls back to
    /// [`DEFAULT_CACHE_CAPACITY`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            loading: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a cached graph, promoting it to most-recently-used.
    #[must_use]
    pub fn get(&self, snapshot_id: &str) -> Option<Arc<Graph>> {
        self.entries.lock().get(snapshot_id).cloned()
    }

    /// Insert a graph, evicting the least-recently-used entry when full.
    pub fn put(&self, snapshot_id: impl Into<String>, graph: Arc<Graph>) {
        self.entries.lock().put(snapshot_id.into(), graph);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Fetch the graph for a snapshot, loading it through `loader` on a
    /// miss. Concurrent callers for the same id share one load.
    pub async fn get_or_load<F, Fut>(&self, snapshot_id: &str, loader: F) -> Result<Arc<Graph>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Graph>>,
    {
        if let Some(graph) = self.get(snapshot_id) {
            return Ok(graph);
        }

        let load_lock = {
            let mut loading = self.loading.lock();
            Arc::clone(
                loading
                    .entry(snapshot_id.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let guard = load_lock.lock().await;

        // Another caller may have finished the load while we waited.
        if let Some(graph) = self.get(snapshot_id) {
            return Ok(graph);
        }

        tracing::debug!(snapshot = snapshot_id, "loading graph into cache");
        let graph = Arc::new(loader().await?);
        self.put(snapshot_id, Arc::clone(&graph));
        drop(guard);
        self.loading.lock().remove(snapshot_id);
        Ok(graph)
    }
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, NodeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn graph_with_node(id: &str) -> Graph {
        let mut g = Graph::new();
        g.add_node(Node::new(id, NodeKind::Resource));
        g
    }

    #[test]
    fn test_get_miss() {
        let cache = GraphCache::default();
        assert!(cache.get("snap-1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_and_get() {
        let cache = GraphCache::default();
        cache.put("snap-1", Arc::new(graph_with_node("a")));

        let cached = cache.get("snap-1").unwrap();
        assert!(cached.contains_node("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = GraphCache::new(2);
        cache.put("snap-1", Arc::new(graph_with_node("a")));
        cache.put("snap-2", Arc::new(graph_with_node("b")));

        // Touch snap-1 so snap-2 is the eviction candidate.
        assert!(cache.get("snap-1").is_some());
        cache.put("snap-3", Arc::new(graph_with_node("c")));

        assert!(cache.get("snap-1").is_some());
        assert!(cache.get("snap-2").is_none());
        assert!(cache.get("snap-3").is_some());
    }

    #[test]
    fn test_zero_capacity_falls_back_to_default() {
        let cache = GraphCache::new(0);
        for i in 0..DEFAULT_CACHE_CAPACITY {
            cache.put(format!("snap-{i}"), Arc::new(Graph::new()));
        }
        assert_eq!(cache.len(), DEFAULT_CACHE_CAPACITY);
    }

    #[tokio::test]
    async fn test_get_or_load_populates_cache() {
        let cache = GraphCache::default();
        let graph = cache
            .get_or_load("snap-1", || async { Ok(graph_with_node("a")) })
            .await
            .unwrap();
        assert!(graph.contains_node("a"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_load_hit_skips_loader() {
        let cache = GraphCache::default();
        cache.put("snap-1", Arc::new(graph_with_node("cached")));

        let loads = AtomicUsize::new(0);
        let graph = cache
            .get_or_load("snap-1", || {
                loads.fetch_add(1, Ordering::SeqCst);
                async { Ok(graph_with_node("fresh")) }
            })
            .await
            .unwrap();

        assert!(graph.contains_node("cached"));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_or_load_error_not_cached() {
        let cache = GraphCache::default();
        let result = cache
            .get_or_load("snap-1", || async {
                Err(crate::error::Error::Storage("boom".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.get("snap-1").is_none());
    }

    #[tokio::test]
    async fn test_single_flight_concurrent_misses() {
        let cache = Arc::new(GraphCache::default());
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load("snap-1", move || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        async move {
                            tokio::task::yield_now().await;
                            Ok(graph_with_node("a"))
                        }
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            let graph = handle.await.unwrap();
            assert!(graph.contains_node("a"));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
