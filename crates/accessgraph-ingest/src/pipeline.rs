//! Ingest pipeline: run the configured parsers, merge their batches, and
//! assemble the in-memory graph.
//!
//! Parser failures are isolated: an AWS parse error never aborts the
//! Kubernetes parser and vice versa. Each failure is recorded against its
//! source. Edge insertion failures (an endpoint missing after merge) are
//! downgraded to a warning and a drop count, per the graph's self-healing
//! read semantics.

use crate::batch::Batch;
use crate::{aws, k8s, tfplan};
use accessgraph::{Error, Graph};
use std::path::PathBuf;
use tracing::warn;

/// Which sources an ingest run should read. Everything is optional; an
/// all-`None` configuration produces an empty graph.
#[derive(Debug, Clone, Default)]
pub struct IngestSources {
    /// Directory holding `roles.json`, `policies.json`, `attachments.json`.
    pub aws_dir: Option<PathBuf>,
    /// Kubernetes YAML streams.
    pub k8s_files: Vec<PathBuf>,
    /// Terraform plan JSON.
    pub plan_file: Option<PathBuf>,
}

/// The assembled graph plus everything the run had to say about its inputs.
#[derive(Debug)]
pub struct IngestOutcome {
    pub graph: Graph,
    /// Per-record diagnostics from all parsers, in source order.
    pub diagnostics: Vec<String>,
    /// Document-level parser failures, wrapped with their source.
    pub source_errors: Vec<String>,
    /// Edges dropped because an endpoint was missing after merge.
    pub dropped_edges: usize,
}

/// Run every configured parser and build a graph from the merged batches.
#[must_use]
pub fn ingest(sources: &IngestSources) -> IngestOutcome {
    let mut merged = Batch::new();
    let mut source_errors = Vec::new();

    if let Some(dir) = &sources.aws_dir {
        match aws::parse_dir(dir) {
            Ok(batch) => merged.merge(batch),
            Err(e) => source_errors.push(format!("aws:{}: {e}", dir.display())),
        }
    }
    for file in &sources.k8s_files {
        match k8s::parse_file(file) {
            Ok(batch) => merged.merge(batch),
            Err(e) => source_errors.push(format!("k8s:{}: {e}", file.display())),
        }
    }
    if let Some(plan) = &sources.plan_file {
        match tfplan::parse_plan(plan) {
            Ok(Some(batch)) => merged.merge(batch),
            Ok(None) => {}
            Err(e) => source_errors.push(format!("tfplan:{}: {e}", plan.display())),
        }
    }

    let diagnostics = std::mem::take(&mut merged.diagnostics);
    let (graph, dropped_edges) = build_graph(merged);
    IngestOutcome {
        graph,
        diagnostics,
        source_errors,
        dropped_edges,
    }
}

/// Assemble a graph from a merged batch: nodes first (first-write-wins),
/// then edges, dropping any edge whose endpoint never materialized.
#[must_use]
pub fn build_graph(batch: Batch) -> (Graph, usize) {
    let mut graph = Graph::new();
    for node in batch.nodes {
        graph.add_node(node);
    }
    let mut dropped = 0;
    for edge in batch.edges {
        if let Err(Error::MissingEndpoint(id)) = graph.add_edge(edge) {
            warn!(endpoint = %id, "dropping edge with missing endpoint");
            dropped += 1;
        }
    }
    (graph, dropped)
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use accessgraph::{edge_kinds, Edge, Node, NodeKind};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_sources_empty_graph() {
        let outcome = ingest(&IngestSources::default());
        assert_eq!(outcome.graph.node_count(), 0);
        assert_eq!(outcome.graph.edge_count(), 0);
        assert!(outcome.source_errors.is_empty());
    }

    #[test]
    fn test_build_graph_dedups_and_drops() {
        let mut batch = Batch::new();
        batch.push_node(Node::new("a", NodeKind::Principal));
        batch.push_node(Node::new("a", NodeKind::Resource));
        batch.push_node(Node::new("b", NodeKind::Policy));
        batch.push_edge(Edge::new("a", "b", edge_kinds::ATTACHED_POLICY));
        batch.push_edge(Edge::new("a", "ghost", edge_kinds::APPLIES_TO));

        let (graph, dropped) = build_graph(batch);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(dropped, 1);
        // First write won.
        assert_eq!(graph.get_node("a").unwrap().kind, NodeKind::Principal);
    }

    #[test]
    fn test_parser_failure_does_not_abort_others() {
        let dir = TempDir::new().unwrap();
        let aws_dir = dir.path().join("aws");
        fs::create_dir(&aws_dir).unwrap();
        fs::write(aws_dir.join("roles.json"), "garbage").unwrap();

        let k8s_file = dir.path().join("sa.yaml");
        fs::write(
            &k8s_file,
            "kind: ServiceAccount\nmetadata:\n  name: sa\n  namespace: ns\n",
        )
        .unwrap();

        let outcome = ingest(&IngestSources {
            aws_dir: Some(aws_dir),
            k8s_files: vec![k8s_file],
            plan_file: None,
        });

        assert_eq!(outcome.source_errors.len(), 1);
        assert!(outcome.source_errors[0].starts_with("aws:"));
        assert!(outcome.graph.contains_node("k8s:sa:ns:sa"));
    }

    #[test]
    fn test_missing_plan_file_is_silent() {
        let outcome = ingest(&IngestSources {
            plan_file: Some(PathBuf::from("/nonexistent/plan.json")),
            ..IngestSources::default()
        });
        assert!(outcome.source_errors.is_empty());
        assert_eq!(outcome.graph.node_count(), 0);
    }

    #[test]
    fn test_cross_source_merge() {
        let dir = TempDir::new().unwrap();
        let aws_dir = dir.path().join("aws");
        fs::create_dir(&aws_dir).unwrap();
        fs::write(
            aws_dir.join("roles.json"),
            r#"{"Roles":[{"RoleName":"Dev","Arn":"arn:aws:iam::111111111111:role/Dev"}]}"#,
        )
        .unwrap();
        fs::write(
            aws_dir.join("policies.json"),
            r#"{"Policies":[{"PolicyName":"P","Arn":"arn:aws:iam::111111111111:policy/P","Document":{"Statement":[{"Effect":"Allow","Action":"s3:GetObject","Resource":"arn:aws:s3:::b"}]}}]}"#,
        )
        .unwrap();
        fs::write(
            aws_dir.join("attachments.json"),
            r#"{"Attachments":[{"RoleName":"Dev","PolicyArn":"arn:aws:iam::111111111111:policy/P"}]}"#,
        )
        .unwrap();

        let outcome = ingest(&IngestSources {
            aws_dir: Some(aws_dir),
            ..IngestSources::default()
        });

        assert_eq!(outcome.dropped_edges, 0);
        assert!(outcome.source_errors.is_empty());
        let path = outcome
            .graph
            .shortest_path("arn:aws:iam::111111111111:role/Dev", "arn:aws:s3:::b", 8)
            .unwrap();
        assert_eq!(path.hops(), 3);
    }
}
