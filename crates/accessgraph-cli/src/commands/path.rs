//! `accessgraph path` - reachability and attack-path queries.

use crate::helpers::load_graph;
use crate::output::{print_success, print_warning, write_output};
use accessgraph::GraphCache;
use accessgraph_store::SnapshotStore;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct PathArgs {
    /// Snapshot database path
    #[arg(long)]
    pub db: PathBuf,

    /// Snapshot id to query
    #[arg(long)]
    pub snapshot: String,

    /// Source node id
    #[arg(long)]
    pub from: String,

    /// Target node id (omit with --tag sensitive for biased search)
    #[arg(long)]
    pub to: Option<String>,

    /// Target tags, e.g. "sensitive" (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Hop budget; 0 means the default of 8
    #[arg(long, default_value_t = 0)]
    pub max_hops: usize,

    /// Write the Markdown report here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Also write a SARIF 2.1.0 document here
    #[arg(long)]
    pub sarif: Option<PathBuf>,
}

pub async fn run(args: PathArgs) -> Result<()> {
    let store = SnapshotStore::open(&args.db).await?;
    let cache = GraphCache::default();
    let graph = load_graph(&store, &cache, &args.snapshot).await?;

    let result = graph.find_attack_path(
        &args.from,
        args.to.as_deref(),
        &args.tags,
        args.max_hops,
    )?;
    store.close().await;

    if !result.found {
        print_warning("no attack path found");
        return Ok(());
    }

    let target = result
        .nodes
        .last()
        .map(|n| n.id.clone())
        .unwrap_or_default();
    print_success(&format!(
        "path found: {} -> {} ({} hops)",
        args.from,
        target,
        result.edges.len()
    ));

    let report =
        accessgraph_export::markdown::attack_path_report(&args.from, &target, &result.nodes, &result.edges);
    write_output(args.out.as_deref(), &report)?;

    if let Some(sarif_path) = &args.sarif {
        let sarif = accessgraph_export::sarif::attack_path(&args.from, &target, &result.edges)?;
        write_output(Some(sarif_path), &sarif)?;
    }
    Ok(())
}
