//! # AccessGraph Recommender
//!
//! Least-privilege narrowing for wildcard policies. The recommender mines
//! the graph for evidence of actual use: it enumerates the principals
//! attached to a policy, walks shortest paths from each principal to the
//! candidate targets, and keeps the concrete actions and resources observed
//! on paths that traverse the policy. The result is a sorted, capped pair
//! of suggestion sets and an RFC 6902 patch that would tighten the policy's
//! first statement.
//!
//! Determinism: principals are enumerated in edge-log order, targets in
//! ascending id order, and the output sets are sorted lexicographically.

use accessgraph::{edge_kinds, Error, Graph, NodeKind, Result};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::debug;

/// Cap applied to each suggestion set when the caller passes `cap == 0`.
pub const DEFAULT_CAP: usize = 20;

/// Edge kinds that denote a principal-to-policy attachment.
const ATTACHMENT_KINDS: &[&str] = &[edge_kinds::ATTACHED_POLICY, "HAS_POLICY", "HAS_ROLE"];

/// Policy-node props inspected for wildcard grants.
const WILDCARD_PROP_KEYS: &[&str] = &["action", "actions", "verbs", "resource", "resources"];

const NO_WILDCARD_RATIONALE: &str = "Policy does not contain wildcard permissions.";

const RATIONALE_POLICY_CHARS: usize = 60;

/// A narrowing recommendation for one policy.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub policy_id: String,
    pub suggested_actions: Vec<String>,
    pub suggested_resources: Vec<String>,
    /// RFC 6902 patch: `replace` at `/Statement/0/Action` and
    /// `/Statement/0/Resource`, either omitted when its set is empty.
    pub patch: serde_json::Value,
    pub rationale: String,
}

/// True for the wildcard shapes `*`, `*:...`, `...:*`, and `.../*`.
#[must_use]
pub fn is_wildcard_shape(value: &str) -> bool {
    value == "*" || value.starts_with("*:") || value.ends_with(":*") || value.ends_with("/*")
}

fn policy_carries_wildcard(graph: &Graph, policy_id: &str) -> Result<bool> {
    let node = graph
        .get_node(policy_id)
        .ok_or_else(|| Error::NotFound(policy_id.to_string()))?;
    if node.kind != NodeKind::Policy {
        return Err(Error::NotFound(policy_id.to_string()));
    }
    Ok(WILDCARD_PROP_KEYS
        .iter()
        .any(|key| node.prop(key).is_some_and(is_wildcard_shape)))
}

fn attached_principals(graph: &Graph, policy_id: &str) -> Vec<String> {
    let mut principals = Vec::new();
    for edge in graph.edges() {
        if edge.dst == policy_id
            && ATTACHMENT_KINDS.contains(&edge.kind.as_str())
            && !principals.contains(&edge.src)
        {
            principals.push(edge.src);
        }
    }
    principals
}

fn candidate_targets(graph: &Graph, target: Option<&str>, tags: &[String]) -> Vec<String> {
    if let Some(target) = target.filter(|t| !t.is_empty()) {
        return vec![target.to_string()];
    }
    let sensitive_only = tags.iter().any(|t| t == "sensitive");
    // `Graph::nodes` is sorted by id, so targets come out ordered.
    graph
        .nodes()
        .into_iter()
        .filter(|n| n.kind == NodeKind::Resource)
        .filter(|n| !sensitive_only || n.prop_is_true(accessgraph::props::SENSITIVE))
        .map(|n| n.id)
        .collect()
}

fn build_patch(actions: &[String], resources: &[String]) -> serde_json::Value {
    let mut operations = Vec::new();
    if !actions.is_empty() {
        operations.push(json!({
            "op": "replace",
            "path": "/Statement/0/Action",
            "value": actions,
        }));
    }
    if !resources.is_empty() {
        operations.push(json!({
            "op": "replace",
            "path": "/Statement/0/Resource",
            "value": resources,
        }));
    }
    serde_json::Value::Array(operations)
}

fn truncate_for_rationale(policy_id: &str) -> String {
    policy_id.chars().take(RATIONALE_POLICY_CHARS).collect()
}

/// Compute a narrowing recommendation.
///
/// `target` restricts the search to one node; otherwise a `"sensitive"` tag
/// restricts it to sensitive resources, and no tag at all means every
/// RESOURCE node. `cap == 0` falls back to [`DEFAULT_CAP`]. Fails with
/// `NotFound` for an unknown policy and `NoPrincipals` when nothing is
/// attached to it.
pub fn recommend(
    graph: &Graph,
    policy_id: &str,
    target: Option<&str>,
    tags: &[String],
    cap: usize,
) -> Result<Recommendation> {
    let cap = if cap == 0 { DEFAULT_CAP } else { cap };

    if !policy_carries_wildcard(graph, policy_id)? {
        return Ok(Recommendation {
            policy_id: policy_id.to_string(),
            suggested_actions: Vec::new(),
            suggested_resources: Vec::new(),
            patch: serde_json::Value::Array(Vec::new()),
            rationale: NO_WILDCARD_RATIONALE.to_string(),
        });
    }

    let principals = attached_principals(graph, policy_id);
    if principals.is_empty() {
        return Err(Error::NoPrincipals(policy_id.to_string()));
    }

    let targets = candidate_targets(graph, target, tags);
    debug!(
        policy = policy_id,
        principals = principals.len(),
        targets = targets.len(),
        "mining paths for narrowing evidence"
    );

    let mut actions: BTreeSet<String> = BTreeSet::new();
    let mut resources: BTreeSet<String> = BTreeSet::new();

    for principal in &principals {
        for target in &targets {
            let Ok(path) = graph.shortest_path(principal, target, accessgraph::DEFAULT_MAX_HOPS)
            else {
                continue;
            };
            if !path.nodes.iter().any(|n| n.id == policy_id) {
                continue;
            }
            for edge in &path.edges {
                if let Some(action) = edge.prop(accessgraph::props::ACTION) {
                    if !is_wildcard_shape(action) {
                        actions.insert(action.to_string());
                    }
                }
            }
            resources.insert(target.clone());
        }
    }

    let suggested_actions: Vec<String> = actions.into_iter().take(cap).collect();
    let suggested_resources: Vec<String> = resources.into_iter().take(cap).collect();

    let rationale = format!(
        "Policy {} grants wildcard permissions; examined {} principal(s) against {} target(s) and \
         observed {} concrete action(s) over {} resource(s) in use.",
        truncate_for_rationale(policy_id),
        principals.len(),
        targets.len(),
        suggested_actions.len(),
        suggested_resources.len(),
    );

    Ok(Recommendation {
        policy_id: policy_id.to_string(),
        patch: build_patch(&suggested_actions, &suggested_resources),
        suggested_actions,
        suggested_resources,
        rationale,
    })
}
