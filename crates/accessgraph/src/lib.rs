//! # AccessGraph Core
//!
//! The typed directed multigraph at the center of AccessGraph: node and edge
//! vocabulary, canonical identifier construction, traversal primitives
//! (BFS, shortest path, sensitivity-biased attack paths), and the bounded
//! cache of loaded snapshot graphs.
//!
//! The companion crates build on this one: `accessgraph-ingest` produces
//! node/edge batches, `accessgraph-store` persists and reloads snapshots,
//! and `accessgraph-policy`/`accessgraph-recommend`/`accessgraph-export`
//! consume loaded graphs.

pub mod cache;
pub mod error;
pub mod graph;
pub mod ident;
pub mod types;

pub use cache::{GraphCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Error, Result};
pub use graph::{AttackPath, Graph, Path, DEFAULT_MAX_HOPS};
pub use types::{edge_kinds, props, Edge, Node, NodeKind};
