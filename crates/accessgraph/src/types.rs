//! Node and edge vocabulary for the access graph.
//!
//! Nodes carry a closed `kind` discriminator plus an open string-to-string
//! property bag; edges are directed and keyed by an opaque kind string.
//! Property bags are `BTreeMap`s so serialized key order is canonical, which
//! keeps persisted snapshots and exporter output byte-stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Principal,
    Role,
    Policy,
    Permission,
    Resource,
    Namespace,
    Account,
}

impl NodeKind {
    /// The persisted string form of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Principal => "PRINCIPAL",
            NodeKind::Role => "ROLE",
            NodeKind::Policy => "POLICY",
            NodeKind::Permission => "PERMISSION",
            NodeKind::Resource => "RESOURCE",
            NodeKind::Namespace => "NAMESPACE",
            NodeKind::Account => "ACCOUNT",
        }
    }

    /// Parse the persisted string form. Returns `None` for unknown kinds.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRINCIPAL" => Some(NodeKind::Principal),
            "ROLE" => Some(NodeKind::Role),
            "POLICY" => Some(NodeKind::Policy),
            "PERMISSION" => Some(NodeKind::Permission),
            "RESOURCE" => Some(NodeKind::Resource),
            "NAMESPACE" => Some(NodeKind::Namespace),
            "ACCOUNT" => Some(NodeKind::Account),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge kinds emitted by the bundled parsers.
///
/// The traversal layer treats edge kinds as opaque strings; parsers may
/// introduce further kinds (e.g. `HAS_POLICY`) without touching this module.
pub mod edge_kinds {
    pub const ASSUMES_ROLE: &str = "ASSUMES_ROLE";
    pub const TRUSTS_CROSS_ACCOUNT: &str = "TRUSTS_CROSS_ACCOUNT";
    pub const ATTACHED_POLICY: &str = "ATTACHED_POLICY";
    pub const ALLOWS_ACTION: &str = "ALLOWS_ACTION";
    pub const APPLIES_TO: &str = "APPLIES_TO";
    pub const BINDS_TO: &str = "BINDS_TO";
    pub const IN_NAMESPACE: &str = "IN_NAMESPACE";
}

/// Reserved property keys with defined semantics.
pub mod props {
    pub const NAME: &str = "name";
    pub const ARN: &str = "arn";
    pub const ACCOUNT_ID: &str = "account_id";
    pub const NAMESPACE: &str = "namespace";
    pub const WILDCARD: &str = "wildcard";
    pub const CLUSTER_ADMIN: &str = "cluster_admin";
    pub const SENSITIVE: &str = "sensitive";
    pub const ACTION: &str = "action";
    pub const VERB: &str = "verb";
    pub const RESOURCE: &str = "resource";
    pub const PRINCIPAL: &str = "principal";
    pub const BINDING: &str = "binding";
    pub const STATEMENT_INDEX: &str = "statement_index";
    pub const RULE_INDEX: &str = "rule_index";
    pub const CROSS_ACCOUNT: &str = "cross_account";
}

/// A graph node: globally unique id within a snapshot, closed kind, ordered
/// display labels, and a string property bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub props: BTreeMap<String, String>,
}

impl Node {
    /// Create a node with no labels or props.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            labels: Vec::new(),
            props: BTreeMap::new(),
        }
    }

    /// Append a display label. Label order round-trips through storage.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Set a property. Values may be empty strings.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Look up a property value.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// True iff the property is present with the literal value `"true"`.
    #[must_use]
    pub fn prop_is_true(&self, key: &str) -> bool {
        self.prop(key) == Some("true")
    }

    /// True iff the node carries the given label.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A directed edge. Multiple edges may connect the same ordered pair when
/// their kinds differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub kind: String,
    #[serde(default)]
    pub props: BTreeMap<String, String>,
}

impl Edge {
    /// Create an edge with no props.
    #[must_use]
    pub fn new(src: impl Into<String>, dst: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind: kind.into(),
            props: BTreeMap::new(),
        }
    }

    /// Set a property.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Look up a property value.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }
}
