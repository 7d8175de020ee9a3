//! # AccessGraph Ingestion
//!
//! Side-effect-free normalizers that turn heterogeneous authorization
//! documents into `(nodes, edges)` batches, plus the pipeline that merges
//! batches and assembles the in-memory graph:
//!
//! - [`aws`] — IAM roles, managed policies, attachments, and trust documents
//! - [`k8s`] — ServiceAccounts, Roles/ClusterRoles, bindings, NetworkPolicies
//! - [`tfplan`] — Terraform plan deltas (optional source)
//!
//! Parsers accumulate errors at the file granularity: malformed records are
//! skipped with diagnostics, malformed files fail their parser, and a
//! missing optional source is simply absent.

pub mod aws;
pub mod batch;
pub mod k8s;
pub mod pipeline;
pub mod tfplan;

pub use batch::Batch;
pub use pipeline::{build_graph, ingest, IngestOutcome, IngestSources};
