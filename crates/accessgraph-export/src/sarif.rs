//! SARIF v2.1.0 export of an attack path.
//!
//! One tool driver ("AccessGraph"), one rule per distinct edge kind on the
//! path, one result per hop. Critical hops (cross-account, `*`, or a
//! service-wide `:*` action) report `level = "error"`, everything else
//! `"warning"`. Locations are synthetic `accessgraph://` URIs derived from
//! a hash of the hop's endpoints, with `startLine` carrying the 1-indexed
//! hop number so CI viewers order hops correctly.

use accessgraph::{props, Edge, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";
const SARIF_VERSION: &str = "2.1.0";
const DRIVER_NAME: &str = "AccessGraph";

#[derive(Serialize)]
struct SarifLog {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<Run>,
}

#[derive(Serialize)]
struct Run {
    tool: Tool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct Tool {
    driver: Driver,
}

#[derive(Serialize)]
struct Driver {
    name: &'static str,
    version: &'static str,
    rules: Vec<Rule>,
}

#[derive(Serialize)]
struct Rule {
    id: String,
    #[serde(rename = "shortDescription")]
    short_description: Message,
}

#[derive(Serialize)]
struct Message {
    text: String,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: &'static str,
    message: Message,
    locations: Vec<Location>,
}

#[derive(Serialize)]
struct Location {
    #[serde(rename = "physicalLocation")]
    physical_location: PhysicalLocation,
}

#[derive(Serialize)]
struct PhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: ArtifactLocation,
    region: Region,
}

#[derive(Serialize)]
struct ArtifactLocation {
    uri: String,
}

#[derive(Serialize)]
struct Region {
    #[serde(rename = "startLine")]
    start_line: usize,
}

/// An edge that warrants `level = "error"`.
fn is_critical(edge: &Edge) -> bool {
    if edge.prop(props::CROSS_ACCOUNT) == Some("true") {
        return true;
    }
    match edge.prop(props::ACTION) {
        Some(action) => action == "*" || action.ends_with(":*"),
        None => false,
    }
}

/// First 16 hex characters of `sha256(src + "->" + dst)`.
fn hop_fingerprint(edge: &Edge) -> String {
    let digest = Sha256::digest(format!("{}->{}", edge.src, edge.dst).as_bytes());
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Serialize an attack path as a SARIF v2.1.0 document.
pub fn attack_path(source: &str, target: &str, edges: &[Edge]) -> Result<String> {
    let kinds: BTreeSet<&str> = edges.iter().map(|e| e.kind.as_str()).collect();
    let rules = kinds
        .into_iter()
        .map(|kind| Rule {
            id: kind.to_string(),
            short_description: Message {
                text: format!("Attack-path edge of kind {kind}"),
            },
        })
        .collect();

    let results = edges
        .iter()
        .enumerate()
        .map(|(i, edge)| SarifResult {
            rule_id: edge.kind.clone(),
            level: if is_critical(edge) { "error" } else { "warning" },
            message: Message {
                text: format!(
                    "Hop {} of path {source} -> {target}: {} -[{}]-> {}",
                    i + 1,
                    edge.src,
                    edge.kind,
                    edge.dst
                ),
            },
            locations: vec![Location {
                physical_location: PhysicalLocation {
                    artifact_location: ArtifactLocation {
                        uri: format!("accessgraph://path/{}", hop_fingerprint(edge)),
                    },
                    region: Region { start_line: i + 1 },
                },
            }],
        })
        .collect();

    let log = SarifLog {
        schema: SARIF_SCHEMA,
        version: SARIF_VERSION,
        runs: vec![Run {
            tool: Tool {
                driver: Driver {
                    name: DRIVER_NAME,
                    version: env!("CARGO_PKG_VERSION"),
                    rules,
                },
            },
            results,
        }],
    };
    Ok(serde_json::to_string_pretty(&log)?)
}
