//! # AccessGraph Exporters
//!
//! Deterministic text exporters: a Markdown attack-path report, SARIF
//! v2.1.0 findings for CI systems, and Neo4j-compatible Cypher for the
//! whole graph. Every exporter is a pure function of its inputs - no
//! wall-clock, environment, or iteration-order dependency - and emits
//! valid minimal output for empty inputs.

pub mod cypher;
pub mod markdown;
pub mod sarif;
