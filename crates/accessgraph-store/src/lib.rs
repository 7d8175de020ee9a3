// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # AccessGraph Snapshot Store
//!
//! Durable multi-snapshot SQLite repository. Each ingest run is persisted
//! under a caller-chosen snapshot id; snapshots are immutable once written
//! and coexist in one database. Reads are order-canonical so a reloaded
//! snapshot is byte-stable, which is what makes snapshot diffing and
//! golden-file exports practical.

mod store;

pub use store::{Snapshot, SnapshotStore, DEFAULT_SEARCH_LIMIT};

use accessgraph::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Bound a store (or any) operation with a deadline. An elapsed deadline
/// surfaces as [`Error::Canceled`]; writes still commit fully or roll back
/// on the worker regardless of the caller abandoning the wait.
pub async fn with_deadline<T>(
    deadline: Duration,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(Error::Canceled(format!(
            "deadline of {}ms elapsed",
            deadline.as_millis()
        ))),
    }
}
