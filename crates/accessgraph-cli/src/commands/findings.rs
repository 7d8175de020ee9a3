//! `accessgraph findings` - project a snapshot and run the rule evaluator.

use crate::helpers::load_graph;
use crate::output::print_success;
use accessgraph::GraphCache;
use accessgraph_policy::{build_projection, Evaluator, HttpEvaluator, Severity};
use accessgraph_store::SnapshotStore;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct FindingsArgs {
    /// Snapshot database path
    #[arg(long)]
    pub db: PathBuf,

    /// Snapshot id to evaluate
    #[arg(long)]
    pub snapshot: String,

    /// Rule evaluator endpoint
    #[arg(long)]
    pub evaluator_url: String,

    /// Evaluator deadline in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

pub async fn run(args: FindingsArgs) -> Result<()> {
    let store = SnapshotStore::open(&args.db).await?;
    let cache = GraphCache::default();
    let graph = load_graph(&store, &cache, &args.snapshot).await?;
    store.close().await;

    let facts = build_projection(&graph);
    let evaluator = HttpEvaluator::builder()
        .url(&args.evaluator_url)
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    let findings = evaluator.evaluate(&facts).await?;
    if findings.is_empty() {
        print_success("no findings");
        return Ok(());
    }

    for finding in &findings {
        // LOW and MEDIUM are informational; HIGH is highlighted.
        let severity = match finding.severity {
            Severity::High => "HIGH".red().bold(),
            Severity::Medium => "MEDIUM".yellow(),
            Severity::Low => "LOW".normal(),
        };
        println!(
            "[{severity}] {} {}: {} ({})",
            finding.rule_id, finding.entity_ref, finding.reason, finding.remediation
        );
    }
    print_success(&format!("{} finding(s)", findings.len()));
    Ok(())
}
