pub mod export;
pub mod findings;
pub mod ingest;
pub mod path;
pub mod recommend;
pub mod snapshots;
