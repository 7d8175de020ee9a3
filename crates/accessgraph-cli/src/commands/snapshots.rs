//! `accessgraph snapshots` - list and diff persisted snapshots.

use crate::output::print_success;
use accessgraph_store::SnapshotStore;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Args)]
pub struct SnapshotsArgs {
    #[command(subcommand)]
    pub command: SnapshotsCommand,
}

#[derive(Subcommand)]
pub enum SnapshotsCommand {
    /// List snapshots, newest first
    List {
        #[arg(long)]
        db: PathBuf,
    },
    /// Diff the edge sets of two snapshots
    Diff {
        #[arg(long)]
        db: PathBuf,
        /// Older snapshot id
        a: String,
        /// Newer snapshot id
        b: String,
    },
}

pub async fn run(args: SnapshotsArgs) -> Result<()> {
    match args.command {
        SnapshotsCommand::List { db } => list(db).await,
        SnapshotsCommand::Diff { db, a, b } => diff(db, &a, &b).await,
    }
}

async fn list(db: PathBuf) -> Result<()> {
    let store = SnapshotStore::open(&db).await?;
    let snapshots = store.list_snapshots().await?;
    if snapshots.is_empty() {
        println!("no snapshots");
    }
    for snapshot in snapshots {
        let nodes = store.count_nodes(&snapshot.id).await?;
        let edges = store.count_edges(&snapshot.id).await?;
        println!(
            "{}  {}  {} nodes, {} edges  {}",
            snapshot.created_at,
            snapshot.id,
            nodes,
            edges,
            snapshot.label.unwrap_or_default()
        );
    }
    store.close().await;
    Ok(())
}

/// Edge identity for diffing: `(src, dst, kind)`, matching the storage key.
fn edge_keys(edges: &[accessgraph::Edge]) -> BTreeSet<(String, String, String)> {
    edges
        .iter()
        .map(|e| (e.src.clone(), e.dst.clone(), e.kind.clone()))
        .collect()
}

async fn diff(db: PathBuf, a: &str, b: &str) -> Result<()> {
    let store = SnapshotStore::open(&db).await?;
    let edges_a = edge_keys(&store.get_edges(a).await?);
    let edges_b = edge_keys(&store.get_edges(b).await?);

    for (src, dst, kind) in edges_b.difference(&edges_a) {
        println!("+ {src} -[{kind}]-> {dst}");
    }
    for (src, dst, kind) in edges_a.difference(&edges_b) {
        println!("- {src} -[{kind}]-> {dst}");
    }
    let unchanged = edges_a.intersection(&edges_b).count();
    print_success(&format!(
        "{} added, {} removed, {} unchanged",
        edges_b.difference(&edges_a).count(),
        edges_a.difference(&edges_b).count(),
        unchanged
    ));
    store.close().await;
    Ok(())
}
