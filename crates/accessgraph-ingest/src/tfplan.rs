//! Terraform plan normalizer.
//!
//! Consumes the `terraform show -json` plan format and emits synthetic
//! POLICY subgraphs for IAM policies the plan would create, plus
//! `#expanded` variants for updates whose "after" document introduces a
//! wildcard action the "before" lacked. The plan file is optional: a
//! missing path reports `None`, not an error.

use crate::aws::{emit_policy_statements, PolicyDocument};
use crate::batch::Batch;
use accessgraph::ident::{tf_policy, tf_policy_expanded};
use accessgraph::{props, Error, Node, NodeKind, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Plan {
    #[serde(rename = "resource_changes", default)]
    resource_changes: Vec<ResourceChange>,
}

#[derive(Debug, Deserialize)]
struct ResourceChange {
    address: String,
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    change: Change,
}

#[derive(Debug, Default, Deserialize)]
struct Change {
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    before: Option<serde_json::Value>,
    #[serde(default)]
    after: Option<serde_json::Value>,
}

/// Parse a plan file. `Ok(None)` means the file does not exist.
pub fn parse_plan(path: &Path) -> Result<Option<Batch>> {
    if !path.exists() {
        debug!(path = %path.display(), "no infrastructure plan, skipping");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    parse_plan_str(&content, &path.display().to_string()).map(Some)
}

/// Parse plan JSON content.
pub fn parse_plan_str(content: &str, source: &str) -> Result<Batch> {
    let plan: Plan = serde_json::from_str(content)
        .map_err(|e| Error::ParseMalformed(format!("{source}: {e}")))?;

    let mut batch = Batch::new();
    for change in &plan.resource_changes {
        if change.resource_type != "aws_iam_policy" {
            continue;
        }
        if change.change.actions.iter().any(|a| a == "create") {
            emit_planned_policy(change, &mut batch, source);
        } else if change.change.actions.iter().any(|a| a == "update") {
            emit_expanded_policy(change, &mut batch, source);
        }
    }
    Ok(batch)
}

/// The `policy` attribute of an `aws_iam_policy` resource is a JSON string.
fn policy_document(value: Option<&serde_json::Value>) -> Option<PolicyDocument> {
    let raw = value?.get("policy")?.as_str()?;
    serde_json::from_str(raw).ok()
}

fn policy_name(value: Option<&serde_json::Value>, fallback: &str) -> String {
    value
        .and_then(|v| v.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

fn emit_planned_policy(change: &ResourceChange, batch: &mut Batch, source: &str) {
    let Some(document) = policy_document(change.change.after.as_ref()) else {
        warn!(source, address = %change.address, "planned policy without parseable document");
        batch.diagnostic(format!(
            "{source}: {}: planned policy without parseable document",
            change.address
        ));
        return;
    };
    let policy_id = tf_policy(&change.address);
    let name = policy_name(change.change.after.as_ref(), &change.address);
    batch.push_node(
        Node::new(&policy_id, NodeKind::Policy)
            .with_label(&name)
            .with_prop(props::NAME, name),
    );
    emit_policy_statements(&policy_id, &document, batch);
}

fn wildcard_actions(document: &PolicyDocument) -> BTreeSet<String> {
    let mut actions = BTreeSet::new();
    for statement in document.statement.clone().into_vec() {
        if statement.effect != "Allow" {
            continue;
        }
        for action in statement
            .action
            .map(crate::aws::OneOrMany::into_vec)
            .unwrap_or_default()
        {
            if action == "*" || action.ends_with(":*") {
                actions.insert(action);
            }
        }
    }
    actions
}

fn emit_expanded_policy(change: &ResourceChange, batch: &mut Batch, source: &str) {
    let Some(after) = policy_document(change.change.after.as_ref()) else {
        return;
    };
    let before_wildcards = policy_document(change.change.before.as_ref())
        .as_ref()
        .map(wildcard_actions)
        .unwrap_or_default();
    let after_wildcards = wildcard_actions(&after);

    if after_wildcards.difference(&before_wildcards).next().is_none() {
        return;
    }
    debug!(source, address = %change.address, "update widens permissions");

    let policy_id = tf_policy_expanded(&change.address);
    let name = policy_name(change.change.after.as_ref(), &change.address);
    batch.push_node(
        Node::new(&policy_id, NodeKind::Policy)
            .with_label(&name)
            .with_prop(props::NAME, name),
    );
    emit_policy_statements(&policy_id, &after, batch);
}
