//! Canonical identifier construction.
//!
//! Every identifier is a total function of the parsed inputs; no timestamp
//! or random value participates. The same source document therefore always
//! produces the same node ids, which is what makes cross-parser
//! deduplication and snapshot diffing possible.

/// The root-account ARN for an AWS account id.
#[must_use]
pub fn aws_account_root(account_id: &str) -> String {
    format!("arn:aws:iam::{account_id}:root")
}

/// Per-statement permission node id, stable given sorted statement order.
#[must_use]
pub fn permission_id(policy_arn: &str, statement_index: usize, action: &str) -> String {
    format!("{policy_arn}#stmt{statement_index}#{action}")
}

/// Kubernetes ServiceAccount id.
#[must_use]
pub fn k8s_service_account(namespace: &str, name: &str) -> String {
    format!("k8s:sa:{namespace}:{name}")
}

/// Kubernetes Namespace id.
#[must_use]
pub fn k8s_namespace(name: &str) -> String {
    format!("k8s:ns:{name}")
}

/// Kubernetes Role id: cluster-scoped roles omit the namespace segment.
#[must_use]
pub fn k8s_role(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("k8s:role:{ns}:{name}"),
        None => format!("k8s:role:{name}"),
    }
}

/// Kubernetes binding id.
#[must_use]
pub fn k8s_binding(name: &str) -> String {
    format!("k8s:binding:{name}")
}

/// The prefix shared by all binding ids; stripped when keying projection facts.
pub const K8S_BINDING_PREFIX: &str = "k8s:binding:";

/// Non-ServiceAccount binding subject id (`k8s:<kind-lowercased>:<name>`).
#[must_use]
pub fn k8s_subject(kind: &str, name: &str) -> String {
    format!("k8s:{}:{name}", kind.to_lowercase())
}

/// Per-rule permission node id for a Kubernetes role.
#[must_use]
pub fn k8s_rule_permission(role_id: &str, rule_index: usize, verb: &str, resource: &str) -> String {
    format!("{role_id}#rule{rule_index}#{verb}#{resource}")
}

/// Kubernetes NetworkPolicy resource id.
#[must_use]
pub fn k8s_network_policy(namespace: &str, name: &str) -> String {
    format!("k8s:netpol:{namespace}:{name}")
}

/// Synthetic policy id for a planned Terraform resource.
#[must_use]
pub fn tf_policy(address: &str) -> String {
    format!("tf:{address}")
}

/// Synthetic policy id for a Terraform update that widens permissions.
#[must_use]
pub fn tf_policy_expanded(address: &str) -> String {
    format!("tf:{address}#expanded")
}
