//! Graph-to-facts projection.
//!
//! The rule engine does not walk the graph; it consumes a compact fact
//! object projected from it. All maps are `BTreeMap`s so the serialized
//! fact object is byte-stable for a given graph.

use accessgraph::ident::K8S_BINDING_PREFIX;
use accessgraph::{edge_kinds, props, Graph, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The fact object posted to the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub roles: BTreeMap<String, RoleFacts>,
    pub policies: BTreeMap<String, PolicyFacts>,
    pub k8s: K8sFacts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFacts {
    pub arn: String,
    pub name: String,
    pub trust: TrustFacts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustFacts {
    pub cross_account: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFacts {
    pub id: String,
    pub name: String,
    pub action_matches_wildcard: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sFacts {
    pub bindings: BTreeMap<String, BindingFacts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingFacts {
    pub name: String,
    pub cluster_admin: bool,
}

/// Project a loaded graph into the fact object.
#[must_use]
pub fn build_projection(graph: &Graph) -> Projection {
    let edges = graph.edges();

    // Principals with at least one outbound cross-account trust edge.
    let cross_account: HashSet<&str> = edges
        .iter()
        .filter(|e| e.kind == edge_kinds::TRUSTS_CROSS_ACCOUNT)
        .map(|e| e.src.as_str())
        .collect();

    // Policies with at least one wildcard permission one ALLOWS_ACTION hop away.
    let mut wildcard_policies: HashMap<&str, bool> = HashMap::new();
    for edge in &edges {
        if edge.kind != edge_kinds::ALLOWS_ACTION {
            continue;
        }
        let Some(permission) = graph.get_node(&edge.dst) else {
            continue;
        };
        if permission.kind != NodeKind::Permission {
            continue;
        }
        let wildcard = permission.prop_is_true(props::WILDCARD)
            || permission.prop(props::ACTION).is_some_and(|a| a.contains('*'));
        let entry = wildcard_policies.entry(edge.src.as_str()).or_insert(false);
        *entry = *entry || wildcard;
    }

    let mut projection = Projection::default();

    for node in graph.nodes() {
        match node.kind {
            NodeKind::Principal if node.has_label("aws-role") => {
                projection.roles.insert(
                    node.id.clone(),
                    RoleFacts {
                        arn: node.prop(props::ARN).unwrap_or(&node.id).to_string(),
                        name: node.prop(props::NAME).unwrap_or(&node.id).to_string(),
                        trust: TrustFacts {
                            cross_account: cross_account.contains(node.id.as_str()),
                        },
                    },
                );
            }
            NodeKind::Policy => {
                projection.policies.insert(
                    node.id.clone(),
                    PolicyFacts {
                        id: node.id.clone(),
                        name: node.prop(props::NAME).unwrap_or(&node.id).to_string(),
                        action_matches_wildcard: wildcard_policies
                            .get(node.id.as_str())
                            .copied()
                            .unwrap_or(false),
                    },
                );
            }
            _ => {}
        }
    }

    // Bindings are keyed by the `binding` edge prop (falling back to the
    // source role's name), with the canonical id prefix stripped. A binding
    // is emitted at most once; the first edge wins.
    for edge in &edges {
        if edge.kind != edge_kinds::BINDS_TO {
            continue;
        }
        let role = graph.get_node(&edge.src);
        let role_name = role.and_then(|r| r.prop(props::NAME)).unwrap_or(&edge.src);
        let key = edge
            .prop(props::BINDING)
            .unwrap_or(role_name)
            .trim_start_matches(K8S_BINDING_PREFIX)
            .to_string();
        if projection.k8s.bindings.contains_key(&key) {
            continue;
        }

        let cluster_admin = role.map_or(false, |r| {
            r.prop_is_true(props::CLUSTER_ADMIN) || r.prop(props::NAME) == Some("cluster-admin")
        });
        projection.k8s.bindings.insert(
            key.clone(),
            BindingFacts {
                name: key,
                cluster_admin,
            },
        );
    }

    projection
}
