//! In-memory directed multigraph and its traversal primitives.
//!
//! The graph keeps four views of the same data: an id-keyed node map, a
//! petgraph `DiGraph` companion used by the traversal routines, an outbound
//! adjacency index used for edge-kind resolution, and an insertion-ordered
//! edge log used for enumeration. Nodes are first-write-wins; edges require
//! both endpoints to be present at insertion time.
//!
//! A `Graph` value is safe for any number of concurrent readers; mutation
//! goes through `&mut self` and is therefore exclusive by construction.

use crate::error::{Error, Result};
use crate::types::{props, Edge, Node};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Hop budget applied when the caller passes `max_hops == 0`.
pub const DEFAULT_MAX_HOPS: usize = 8;

/// A concrete directed path. `nodes.len() == edges.len() + 1` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Path {
    /// Number of edges in the path.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.edges.len()
    }
}

/// Attack-path search result. "No path" is a non-error outcome here: the
/// caller asked a question, and `found = false` is a valid answer.
#[derive(Debug, Clone, Default)]
pub struct AttackPath {
    pub found: bool,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl AttackPath {
    fn not_found() -> Self {
        Self::default()
    }
}

impl From<Path> for AttackPath {
    fn from(path: Path) -> Self {
        Self {
            found: true,
            nodes: path.nodes,
            edges: path.edges,
        }
    }
}

/// In-memory directed multigraph over one snapshot.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Node records keyed by id.
    nodes: HashMap<String, Node>,
    /// Companion structure for the traversal routines.
    graph: DiGraph<String, String>,
    /// Map from node id to companion index.
    indices: HashMap<String, NodeIndex>,
    /// Outbound adjacency: src -> dst -> edges in insertion order.
    out_edges: HashMap<String, HashMap<String, Vec<Edge>>>,
    /// Insertion-ordered edge log.
    edges: Vec<Edge>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            graph: DiGraph::new(),
            indices: HashMap::new(),
            out_edges: HashMap::new(),
            edges: Vec::new(),
        }
    }

    /// Insert a node. A second insert for an existing id is a no-op and does
    /// not mutate props; parsers supply complete props on first sight.
    pub fn add_node(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            return;
        }
        let idx = self.graph.add_node(node.id.clone());
        self.indices.insert(node.id.clone(), idx);
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert an edge. Both endpoints must already be present.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        let Some(&src_idx) = self.indices.get(&edge.src) else {
            return Err(Error::MissingEndpoint(edge.src.clone()));
        };
        let Some(&dst_idx) = self.indices.get(&edge.dst) else {
            return Err(Error::MissingEndpoint(edge.dst.clone()));
        };
        self.graph.add_edge(src_idx, dst_idx, edge.kind.clone());
        self.out_edges
            .entry(edge.src.clone())
            .or_default()
            .entry(edge.dst.clone())
            .or_default()
            .push(edge.clone());
        self.edges.push(edge);
        Ok(())
    }

    /// Look up a node by id.
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// True iff the node id is present.
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Materialized copies of all nodes, sorted by id. Callers (exporters in
    /// particular) never observe internal mutation through this.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Materialized copy of the edge log in insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    /// Union of outbound and inbound neighbors, each paired with the kind of
    /// the edge traversed. A neighbor connected by several edges appears once
    /// per edge. Enumeration follows the edge log, so the order is
    /// deterministic for a given insertion order.
    #[must_use]
    pub fn neighbors(&self, id: &str, kinds: Option<&[&str]>) -> Vec<(Node, String)> {
        let mut out = Vec::new();
        for edge in &self.edges {
            let other = if edge.src == id {
                &edge.dst
            } else if edge.dst == id {
                &edge.src
            } else {
                continue;
            };
            if let Some(filter) = kinds {
                if !filter.contains(&edge.kind.as_str()) {
                    continue;
                }
            }
            if let Some(node) = self.nodes.get(other) {
                out.push((node.clone(), edge.kind.clone()));
            }
        }
        out
    }

    /// The first edge inserted between an ordered pair. Traversals use this
    /// as the observable tie-break when parallel edges exist.
    fn first_edge_between(&self, src: &str, dst: &str) -> Option<&Edge> {
        self.out_edges.get(src)?.get(dst)?.first()
    }

    /// Unweighted shortest directed path from `from` to `to`, found by BFS
    /// layering with early termination when the destination is dequeued.
    ///
    /// `max_hops == 0` is replaced with [`DEFAULT_MAX_HOPS`]. Fails with
    /// `NotFound` when either endpoint is absent, `NoPath` when the target is
    /// unreachable, and `ExceedsMaxHops` when the discovered path is longer
    /// than the budget.
    pub fn shortest_path(&self, from: &str, to: &str, max_hops: usize) -> Result<Path> {
        let max_hops = if max_hops == 0 { DEFAULT_MAX_HOPS } else { max_hops };
        let Some(&src) = self.indices.get(from) else {
            return Err(Error::NotFound(from.to_string()));
        };
        let Some(&dst) = self.indices.get(to) else {
            return Err(Error::NotFound(to.to_string()));
        };

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(src);
        queue.push_back(src);

        let mut reached = false;
        while let Some(current) = queue.pop_front() {
            if current == dst {
                reached = true;
                break;
            }
            for neighbor in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(neighbor) {
                    parent.insert(neighbor, current);
                    queue.push_back(neighbor);
                }
            }
        }
        if !reached {
            return Err(Error::NoPath {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let mut index_path = vec![dst];
        let mut current = dst;
        while current != src {
            let Some(&prev) = parent.get(&current) else {
                // BFS recorded a parent for every reached non-source node.
                return Err(Error::NoPath {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            };
            index_path.push(prev);
            current = prev;
        }
        index_path.reverse();

        let hops = index_path.len() - 1;
        if hops > max_hops {
            return Err(Error::ExceedsMaxHops { hops, max_hops });
        }

        let mut nodes = Vec::with_capacity(index_path.len());
        for idx in &index_path {
            let id = &self.graph[*idx];
            if let Some(node) = self.nodes.get(id) {
                nodes.push(node.clone());
            }
        }
        let mut edges = Vec::with_capacity(hops);
        for pair in index_path.windows(2) {
            let a = &self.graph[pair[0]];
            let b = &self.graph[pair[1]];
            if let Some(edge) = self.first_edge_between(a, b) {
                edges.push(edge.clone());
            }
        }
        Ok(Path { nodes, edges })
    }

    /// Attack-path search.
    ///
    /// With an explicit target this is shortest-path with "no path" and
    /// "too long" folded into `found = false`. Without a target, a
    /// `"sensitive"` tag widens the search to every node carrying
    /// `sensitive="true"` (scanned in ascending id order) and the
    /// minimum-length result wins; ties go to the lowest target id.
    pub fn find_attack_path(
        &self,
        from: &str,
        to: Option<&str>,
        tags: &[String],
        max_hops: usize,
    ) -> Result<AttackPath> {
        if let Some(to) = to.filter(|t| !t.is_empty()) {
            return match self.shortest_path(from, to, max_hops) {
                Ok(path) => Ok(AttackPath::from(path)),
                Err(Error::NoPath { .. } | Error::ExceedsMaxHops { .. }) => {
                    Ok(AttackPath::not_found())
                }
                Err(e) => Err(e),
            };
        }

        if tags.iter().any(|t| t == "sensitive") {
            if !self.nodes.contains_key(from) {
                return Err(Error::NotFound(from.to_string()));
            }
            let mut targets: Vec<&str> = self
                .nodes
                .values()
                .filter(|n| n.prop_is_true(props::SENSITIVE))
                .map(|n| n.id.as_str())
                .collect();
            targets.sort_unstable();

            let mut best: Option<Path> = None;
            for target in targets {
                match self.shortest_path(from, target, max_hops) {
                    Ok(path) => {
                        if best.as_ref().map_or(true, |b| path.hops() < b.hops()) {
                            best = Some(path);
                        }
                    }
                    Err(Error::NoPath { .. } | Error::ExceedsMaxHops { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }
            return Ok(best.map_or_else(AttackPath::not_found, AttackPath::from));
        }

        Err(Error::MissingTarget)
    }

    /// Mark a node sensitive on the in-memory copy. This never writes back
    /// to storage.
    pub fn mark_sensitive(&mut self, id: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        node.props
            .insert(props::SENSITIVE.to_string(), "true".to_string());
        Ok(())
    }

    /// Breadth-first traversal over outbound edges, returning visited nodes
    /// in encounter order up to the depth bound. An unknown start id yields
    /// an empty result.
    #[must_use]
    pub fn bfs(&self, start: &str, max_depth: usize) -> Vec<Node> {
        let Some(&start_idx) = self.indices.get(start) else {
            return Vec::new();
        };
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        let mut out = Vec::new();

        visited.insert(start_idx);
        queue.push_back((start_idx, 0));
        if let Some(node) = self.nodes.get(start) {
            out.push(node.clone());
        }

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for neighbor in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(neighbor) {
                    let id = &self.graph[neighbor];
                    if let Some(node) = self.nodes.get(id) {
                        out.push(node.clone());
                    }
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        out
    }
}
