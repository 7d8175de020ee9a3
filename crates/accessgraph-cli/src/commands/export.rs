//! `accessgraph export` - serialize a snapshot for external tools.

use crate::helpers::load_graph;
use crate::output::write_output;
use accessgraph::GraphCache;
use accessgraph_store::SnapshotStore;
use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    /// Neo4j-compatible Cypher statements
    Cypher,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Snapshot database path
    #[arg(long)]
    pub db: PathBuf,

    /// Snapshot id to export
    #[arg(long)]
    pub snapshot: String,

    /// Output format
    #[arg(long, value_enum, default_value = "cypher")]
    pub format: ExportFormat,

    /// Write here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn run(args: ExportArgs) -> Result<()> {
    let store = SnapshotStore::open(&args.db).await?;
    let cache = GraphCache::default();
    let graph = load_graph(&store, &cache, &args.snapshot).await?;
    store.close().await;

    let rendered = match args.format {
        ExportFormat::Cypher => accessgraph_export::cypher::export(&graph),
    };
    write_output(args.out.as_deref(), &rendered)
}
