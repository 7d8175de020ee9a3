//! Shared command helpers.

use accessgraph::{Graph, GraphCache};
use accessgraph_store::SnapshotStore;
use std::sync::Arc;

/// Load a snapshot through the graph cache (single-flight, LRU-bounded).
pub async fn load_graph(
    store: &SnapshotStore,
    cache: &GraphCache,
    snapshot_id: &str,
) -> accessgraph::Result<Arc<Graph>> {
    cache
        .get_or_load(snapshot_id, || async { store.load_snapshot(snapshot_id).await })
        .await
}
