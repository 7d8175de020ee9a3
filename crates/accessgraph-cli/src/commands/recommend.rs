//! `accessgraph recommend` - least-privilege narrowing for one policy.

use crate::helpers::load_graph;
use crate::output::write_output;
use accessgraph::GraphCache;
use accessgraph_store::SnapshotStore;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct RecommendArgs {
    /// Snapshot database path
    #[arg(long)]
    pub db: PathBuf,

    /// Snapshot id to mine
    #[arg(long)]
    pub snapshot: String,

    /// Policy node id to narrow
    #[arg(long)]
    pub policy: String,

    /// Restrict evidence to one target node
    #[arg(long)]
    pub target: Option<String>,

    /// Target tags, e.g. "sensitive" (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Max suggestions per dimension; 0 means the default of 20
    #[arg(long, default_value_t = 0)]
    pub cap: usize,

    /// Write the recommendation JSON here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn run(args: RecommendArgs) -> Result<()> {
    let store = SnapshotStore::open(&args.db).await?;
    let cache = GraphCache::default();
    let graph = load_graph(&store, &cache, &args.snapshot).await?;
    store.close().await;

    let recommendation = accessgraph_recommend::recommend(
        &graph,
        &args.policy,
        args.target.as_deref(),
        &args.tags,
        args.cap,
    )?;

    let mut rendered = serde_json::to_string_pretty(&recommendation)?;
    rendered.push('\n');
    write_output(args.out.as_deref(), &rendered)
}
