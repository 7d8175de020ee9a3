//! Kubernetes RBAC normalizer.
//!
//! Accepts multi-document YAML streams and dispatches on `kind`:
//! ServiceAccount, Role, ClusterRole, RoleBinding, ClusterRoleBinding, and
//! NetworkPolicy. Unknown kinds are skipped with a diagnostic. A document
//! that fails to deserialize for its declared kind is skipped the same way;
//! a stream that is not parseable YAML fails the parser.

use crate::batch::Batch;
use accessgraph::ident::{
    k8s_binding, k8s_namespace, k8s_network_policy, k8s_role, k8s_rule_permission,
    k8s_service_account, k8s_subject,
};
use accessgraph::{edge_kinds, props, Edge, Error, Node, NodeKind, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Label carried by ServiceAccount principals.
pub const SERVICE_ACCOUNT_LABEL: &str = "k8s-serviceaccount";

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

impl Metadata {
    fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

#[derive(Debug, Deserialize)]
struct ServiceAccountDoc {
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct RoleDoc {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct PolicyRule {
    #[serde(default)]
    verbs: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BindingDoc {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    subjects: Vec<Subject>,
    #[serde(rename = "roleRef")]
    role_ref: RoleRef,
}

#[derive(Debug, Clone, Deserialize)]
struct Subject {
    kind: String,
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RoleRef {
    kind: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NetworkPolicyDoc {
    #[serde(default)]
    metadata: Metadata,
}

/// Parse one YAML file.
pub fn parse_file(path: &Path) -> Result<Batch> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, &path.display().to_string())
}

/// Parse a (possibly multi-document) YAML stream.
pub fn parse_str(content: &str, source: &str) -> Result<Batch> {
    let mut batch = Batch::new();

    for (index, document) in serde_yml::Deserializer::from_str(content).enumerate() {
        let value = serde_yml::Value::deserialize(document)
            .map_err(|e| Error::ParseMalformed(format!("{source}: document {index}: {e}")))?;
        if value.is_null() {
            continue;
        }
        let kind = value
            .get("kind")
            .and_then(serde_yml::Value::as_str)
            .unwrap_or("")
            .to_string();

        let outcome = match kind.as_str() {
            "ServiceAccount" => serde_yml::from_value::<ServiceAccountDoc>(value)
                .map(|doc| emit_service_account(&doc, &mut batch)),
            "Role" => serde_yml::from_value::<RoleDoc>(value)
                .map(|doc| emit_role(&doc, true, &mut batch)),
            "ClusterRole" => serde_yml::from_value::<RoleDoc>(value)
                .map(|doc| emit_role(&doc, false, &mut batch)),
            "RoleBinding" | "ClusterRoleBinding" => serde_yml::from_value::<BindingDoc>(value)
                .map(|doc| emit_binding(&doc, &mut batch)),
            "NetworkPolicy" => serde_yml::from_value::<NetworkPolicyDoc>(value)
                .map(|doc| emit_network_policy(&doc, &mut batch)),
            other => {
                batch.diagnostic(format!(
                    "{source}: document {index}: unhandled kind {other:?}, skipped"
                ));
                continue;
            }
        };
        if let Err(e) = outcome {
            warn!(source, document = index, kind = %kind, error = %e, "skipping malformed document");
            batch.diagnostic(format!("{source}: document {index} ({kind}): {e}"));
        }
    }
    Ok(batch)
}

fn emit_service_account(doc: &ServiceAccountDoc, batch: &mut Batch) {
    let namespace = doc.metadata.namespace_or_default();
    let sa_id = k8s_service_account(namespace, &doc.metadata.name);
    let ns_id = k8s_namespace(namespace);

    batch.push_node(
        Node::new(&sa_id, NodeKind::Principal)
            .with_label(&doc.metadata.name)
            .with_label(SERVICE_ACCOUNT_LABEL)
            .with_prop(props::NAME, &doc.metadata.name)
            .with_prop(props::NAMESPACE, namespace),
    );
    batch.push_node(
        Node::new(&ns_id, NodeKind::Namespace)
            .with_label(namespace)
            .with_prop(props::NAME, namespace),
    );
    batch.push_edge(Edge::new(sa_id, ns_id, edge_kinds::IN_NAMESPACE));
}

fn is_cluster_admin(name: &str) -> bool {
    name == "cluster-admin"
}

fn role_node(role_id: &str, name: &str, namespace: Option<&str>) -> Node {
    let mut node = Node::new(role_id, NodeKind::Role)
        .with_label(name)
        .with_prop(props::NAME, name)
        .with_prop(
            props::CLUSTER_ADMIN,
            if is_cluster_admin(name) { "true" } else { "false" },
        );
    if let Some(ns) = namespace {
        node = node.with_prop(props::NAMESPACE, ns);
    }
    node
}

fn emit_role(doc: &RoleDoc, namespaced: bool, batch: &mut Batch) {
    let namespace = namespaced.then(|| doc.metadata.namespace_or_default());
    let role_id = k8s_role(namespace, &doc.metadata.name);
    batch.push_node(role_node(&role_id, &doc.metadata.name, namespace));

    for (index, rule) in doc.rules.iter().enumerate() {
        for verb in &rule.verbs {
            for resource in &rule.resources {
                let perm_id = k8s_rule_permission(&role_id, index, verb, resource);
                let wildcard = verb.contains('*') || resource.contains('*');
                batch.push_node(
                    Node::new(&perm_id, NodeKind::Permission)
                        .with_prop(props::VERB, verb)
                        .with_prop(props::RESOURCE, resource)
                        .with_prop(props::WILDCARD, if wildcard { "true" } else { "false" }),
                );
                batch.push_edge(
                    Edge::new(&role_id, &perm_id, edge_kinds::ALLOWS_ACTION)
                        .with_prop(props::RULE_INDEX, index.to_string()),
                );
            }
        }
    }
}

fn emit_binding(doc: &BindingDoc, batch: &mut Batch) {
    let binding_ns = doc.metadata.namespace_or_default();
    let binding_id = k8s_binding(&doc.metadata.name);

    let role_namespace = (doc.role_ref.kind == "Role").then_some(binding_ns);
    let role_id = k8s_role(role_namespace, &doc.role_ref.name);
    // Stub so the edge always resolves; a parsed Role definition wins when it
    // appears earlier in the stream, and the stub is identical otherwise.
    batch.push_node(role_node(&role_id, &doc.role_ref.name, role_namespace));

    for subject in &doc.subjects {
        let subject_id = if subject.kind == "ServiceAccount" {
            let ns = subject.namespace.as_deref().unwrap_or(binding_ns);
            let id = k8s_service_account(ns, &subject.name);
            batch.push_node(
                Node::new(&id, NodeKind::Principal)
                    .with_label(&subject.name)
                    .with_label(SERVICE_ACCOUNT_LABEL)
                    .with_prop(props::NAME, &subject.name)
                    .with_prop(props::NAMESPACE, ns),
            );
            id
        } else {
            let id = k8s_subject(&subject.kind, &subject.name);
            batch.push_node(
                Node::new(&id, NodeKind::Principal)
                    .with_label(&subject.name)
                    .with_prop(props::NAME, &subject.name),
            );
            id
        };
        batch.push_edge(
            Edge::new(&role_id, subject_id, edge_kinds::BINDS_TO)
                .with_prop(props::BINDING, &binding_id),
        );
    }
}

fn emit_network_policy(doc: &NetworkPolicyDoc, batch: &mut Batch) {
    let namespace = doc.metadata.namespace_or_default();
    let mut node = Node::new(
        k8s_network_policy(namespace, &doc.metadata.name),
        NodeKind::Resource,
    )
    .with_label(&doc.metadata.name)
    .with_prop(props::NAME, &doc.metadata.name)
    .with_prop(props::NAMESPACE, namespace);
    for (key, value) in &doc.metadata.labels {
        node = node.with_prop(key, value);
    }
    batch.push_node(node);
}
