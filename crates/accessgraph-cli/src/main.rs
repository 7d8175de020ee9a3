// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)
// Allow clippy warnings for CLI application
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::clone_on_ref_ptr)]
#![allow(clippy::needless_pass_by_value, clippy::redundant_clone)]

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod helpers;
mod output;

use commands::{export, findings, ingest, path, recommend, snapshots};

/// AccessGraph CLI - who can reach what, and how?
///
/// Workflow:
///   1. `ingest` authorization sources into a named snapshot
///   2. `snapshots list` / `snapshots diff` to inspect captures
///   3. `path` for reachability and attack paths
///   4. `findings`, `recommend`, `export` over a loaded snapshot
#[derive(Parser)]
#[command(name = "accessgraph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Graph analysis over AWS IAM and Kubernetes RBAC", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest authorization sources and persist one snapshot
    Ingest(ingest::IngestArgs),

    /// List or diff persisted snapshots
    Snapshots(snapshots::SnapshotsArgs),

    /// Shortest/attack path between principals and resources
    Path(path::PathArgs),

    /// Run the policy evaluator over a snapshot's fact projection
    Findings(findings::FindingsArgs),

    /// Least-privilege narrowing for a wildcard policy
    Recommend(recommend::RecommendArgs),

    /// Export a snapshot (Cypher)
    Export(export::ExportArgs),
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    // All log bytes pass through the redactor before reaching stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(accessgraph_redact::RedactingMakeWriter::new(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => ingest::run(args).await,
        Commands::Snapshots(args) => snapshots::run(args).await,
        Commands::Path(args) => path::run(args).await,
        Commands::Findings(args) => findings::run(args).await,
        Commands::Recommend(args) => recommend::run(args).await,
        Commands::Export(args) => export::run(args).await,
    }
}
