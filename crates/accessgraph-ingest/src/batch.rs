//! Parser output batches.
//!
//! Every normalizer produces the same shape: a node list, an edge list, and
//! the diagnostics it accumulated while skipping malformed records. Merging
//! concatenates; deduplication is the graph's responsibility (node identity
//! is first-write-wins at `Graph::add_node`).

use accessgraph::{Edge, Node};

/// A `(nodes, edges)` batch plus per-record diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub diagnostics: Vec<String>,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Record a skipped-record diagnostic.
    pub fn diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }

    /// Concatenate another batch onto this one.
    pub fn merge(&mut self, other: Batch) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.diagnostics.extend(other.diagnostics);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
