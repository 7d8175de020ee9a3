//! Markdown attack-path report.
//!
//! A pure function of its inputs: equal paths produce byte-equal reports.
//! An empty path still produces a valid, header-only report.

use accessgraph::{edge_kinds, props, Edge, Node};
use std::fmt::Write;

/// True for edges the report flags as wildcard grants.
fn is_wildcard_edge(edge: &Edge) -> bool {
    edge.prop(props::ACTION).is_some_and(|a| a.contains('*'))
}

/// True for edges the report flags as account-boundary crossings.
fn is_cross_account_edge(edge: &Edge) -> bool {
    edge.kind == edge_kinds::TRUSTS_CROSS_ACCOUNT || edge.prop(props::CROSS_ACCOUNT) == Some("true")
}

/// Render an attack path as a Markdown report.
#[must_use]
pub fn attack_path_report(source: &str, target: &str, nodes: &[Node], edges: &[Edge]) -> String {
    let mut out = String::new();

    out.push_str("# Attack Path Report\n\n");
    let _ = writeln!(out, "- **Source:** `{source}`");
    let _ = writeln!(out, "- **Target:** `{target}`");
    let _ = writeln!(out, "- **Hops:** {}", edges.len());
    out.push('\n');

    out.push_str("## Path\n\n");
    if edges.is_empty() {
        out.push_str("No path found.\n\n");
    } else {
        for (i, edge) in edges.iter().enumerate() {
            let src_kind = nodes
                .get(i)
                .map(|n| n.kind.as_str())
                .unwrap_or("UNKNOWN");
            let dst_kind = nodes
                .get(i + 1)
                .map(|n| n.kind.as_str())
                .unwrap_or("UNKNOWN");
            let _ = writeln!(
                out,
                "{}. `{}` [{}] --[{}]--> `{}` [{}]",
                i + 1,
                edge.src,
                src_kind,
                edge.kind,
                edge.dst,
                dst_kind
            );
        }
        out.push('\n');
    }

    out.push_str("## Risk Annotations\n\n");
    let mut annotated = false;
    for (i, edge) in edges.iter().enumerate() {
        if is_wildcard_edge(edge) {
            let action = edge.prop(props::ACTION).unwrap_or("*");
            let _ = writeln!(out, "- Step {} grants wildcard action `{}`.", i + 1, action);
            annotated = true;
        }
        if is_cross_account_edge(edge) {
            let _ = writeln!(out, "- Step {} crosses an account boundary.", i + 1);
            annotated = true;
        }
    }
    if !annotated {
        out.push_str("No wildcard or cross-account edges on this path.\n");
    }
    out.push('\n');

    out.push_str("## Remediation\n\n");
    out.push_str(
        "Review each grant along this path. Replace wildcard actions with the \
         specific operations in use, scope resources to the ARNs actually \
         accessed, and remove any cross-account trust relationship that is \
         not explicitly required.\n",
    );

    out
}
