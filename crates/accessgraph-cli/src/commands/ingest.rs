//! `accessgraph ingest` - read sources, write one snapshot.

use crate::output::{print_success, print_warning};
use accessgraph_ingest::IngestSources;
use accessgraph_store::SnapshotStore;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct IngestArgs {
    /// Snapshot database path
    #[arg(long)]
    pub db: PathBuf,

    /// Snapshot id to write
    #[arg(long)]
    pub snapshot: String,

    /// Optional human-readable label
    #[arg(long)]
    pub label: Option<String>,

    /// Directory with roles.json, policies.json, attachments.json
    #[arg(long)]
    pub aws_dir: Option<PathBuf>,

    /// Kubernetes RBAC YAML files (repeatable)
    #[arg(long = "k8s")]
    pub k8s_files: Vec<PathBuf>,

    /// Terraform plan JSON (optional)
    #[arg(long)]
    pub plan: Option<PathBuf>,
}

pub async fn run(args: IngestArgs) -> Result<()> {
    let sources = IngestSources {
        aws_dir: args.aws_dir,
        k8s_files: args.k8s_files,
        plan_file: args.plan,
    };
    let outcome = accessgraph_ingest::ingest(&sources);

    for error in &outcome.source_errors {
        print_warning(&format!("source failed: {error}"));
    }
    for diagnostic in &outcome.diagnostics {
        print_warning(diagnostic);
    }
    if outcome.dropped_edges > 0 {
        print_warning(&format!(
            "{} edge(s) dropped for missing endpoints",
            outcome.dropped_edges
        ));
    }

    let store = SnapshotStore::open(&args.db).await?;
    store
        .save_snapshot(&args.snapshot, args.label.as_deref(), &outcome.graph)
        .await?;
    print_success(&format!(
        "snapshot {} saved: {} nodes, {} edges",
        args.snapshot,
        outcome.graph.node_count(),
        outcome.graph.edge_count()
    ));
    store.close().await;
    Ok(())
}
