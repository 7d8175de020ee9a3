//! AWS IAM normalizer.
//!
//! Reads `roles.json`, `policies.json`, and `attachments.json` from a
//! directory and emits the principal/policy/permission/resource subgraph.
//! The document shapes follow `aws iam list-*` output: a top-level array
//! under `Roles`/`Policies`/`Attachments`, with `Statement`, `Action`,
//! `Resource`, and `Principal.AWS` each accepting a single value or an
//! array.
//!
//! A malformed individual record is skipped with a diagnostic; a file that
//! does not parse at all fails the parser; a missing file yields an empty
//! contribution.

use crate::batch::Batch;
use accessgraph::ident::{aws_account_root, permission_id};
use accessgraph::{edge_kinds, props, Edge, Error, Node, NodeKind, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Label carried by every AWS role principal; the policy projection keys on it.
pub const AWS_ROLE_LABEL: &str = "aws-role";

/// Account id assumed when constructing role ARNs from attachment records.
/// Attachments carry role names only; deriving the account from the role
/// file would change snapshot identity for existing fixtures.
const DEFAULT_ACCOUNT_ID: &str = "111111111111";

#[allow(clippy::unwrap_used)]
static ACCOUNT_ID_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r":(\d{12}):").unwrap());

/// Extract the 12-digit account id embedded in an ARN-shaped string.
#[must_use]
pub fn extract_account_id(arn: &str) -> Option<String> {
    ACCOUNT_ID_RE
        .captures(arn)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// A JSON field that may be a single value or an array of values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PolicyDocument {
    #[serde(rename = "Statement", default)]
    pub(crate) statement: OneOrMany<Statement>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Statement {
    #[serde(rename = "Effect", default)]
    pub(crate) effect: String,
    #[serde(rename = "Principal", default)]
    pub(crate) principal: Option<PrincipalBlock>,
    #[serde(rename = "Action", default)]
    pub(crate) action: Option<OneOrMany<String>>,
    #[serde(rename = "Resource", default)]
    pub(crate) resource: Option<OneOrMany<String>>,
}

/// `Principal` is either a map with an `AWS` entry or something this parser
/// does not interpret (`"*"`, service principals, federated blocks).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum PrincipalBlock {
    Aws {
        #[serde(rename = "AWS")]
        aws: OneOrMany<String>,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct RolesFile {
    #[serde(rename = "Roles", default)]
    roles: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RoleRecord {
    #[serde(rename = "RoleName")]
    role_name: String,
    #[serde(rename = "Arn")]
    arn: String,
    #[serde(rename = "AssumeRolePolicyDocument", default)]
    assume_role_policy_document: Option<PolicyDocument>,
}

#[derive(Debug, Deserialize)]
struct PoliciesFile {
    #[serde(rename = "Policies", default)]
    policies: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PolicyRecord {
    #[serde(rename = "PolicyName")]
    policy_name: String,
    #[serde(rename = "Arn")]
    arn: String,
    #[serde(rename = "Document", default)]
    document: Option<PolicyDocument>,
}

#[derive(Debug, Deserialize)]
struct AttachmentsFile {
    #[serde(rename = "Attachments", default)]
    attachments: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AttachmentRecord {
    #[serde(rename = "RoleName")]
    role_name: String,
    #[serde(rename = "PolicyArn")]
    policy_arn: String,
}

/// Parse the three IAM files in `dir` into one batch.
pub fn parse_dir(dir: &Path) -> Result<Batch> {
    let mut batch = Batch::new();
    parse_roles(&dir.join("roles.json"), &mut batch)?;
    parse_policies(&dir.join("policies.json"), &mut batch)?;
    parse_attachments(&dir.join("attachments.json"), &mut batch)?;
    Ok(batch)
}

fn read_optional(path: &Path, batch: &mut Batch) -> Result<Option<String>> {
    if !path.exists() {
        batch.diagnostic(format!("{}: missing, skipped", path.display()));
        return Ok(None);
    }
    Ok(Some(std::fs::read_to_string(path)?))
}

fn parse_roles(path: &Path, batch: &mut Batch) -> Result<()> {
    let Some(content) = read_optional(path, batch)? else {
        return Ok(());
    };
    let file: RolesFile = serde_json::from_str(&content)
        .map_err(|e| Error::ParseMalformed(format!("{}: {e}", path.display())))?;

    let mut roles = Vec::new();
    for (i, value) in file.roles.into_iter().enumerate() {
        match serde_json::from_value::<RoleRecord>(value) {
            Ok(role) => roles.push(role),
            Err(e) => {
                warn!(file = %path.display(), record = i, error = %e, "skipping malformed role");
                batch.diagnostic(format!("{}: role record {i}: {e}", path.display()));
            }
        }
    }

    // Role nodes first so later trust stubs never shadow a real definition.
    for role in &roles {
        let mut node = Node::new(&role.arn, NodeKind::Principal)
            .with_label(&role.role_name)
            .with_label(AWS_ROLE_LABEL)
            .with_prop(props::NAME, &role.role_name)
            .with_prop(props::ARN, &role.arn);
        if let Some(account) = extract_account_id(&role.arn) {
            node = node.with_prop(props::ACCOUNT_ID, account);
        }
        batch.push_node(node);
    }
    for role in &roles {
        emit_trust(role, batch);
    }
    Ok(())
}

fn emit_trust(role: &RoleRecord, batch: &mut Batch) {
    let Some(document) = &role.assume_role_policy_document else {
        return;
    };
    let own_account = extract_account_id(&role.arn);

    for statement in document.statement.clone().into_vec() {
        if statement.effect != "Allow" {
            continue;
        }
        let Some(PrincipalBlock::Aws { aws }) = statement.principal.clone() else {
            continue;
        };
        for principal in aws.into_vec() {
            batch.push_node(
                Node::new(&principal, NodeKind::Principal).with_prop(props::NAME, &principal),
            );
            batch.push_edge(
                Edge::new(&principal, &role.arn, edge_kinds::ASSUMES_ROLE)
                    .with_prop(props::ACTION, "sts:AssumeRole"),
            );

            let trusted_account = extract_account_id(&principal);
            if let (Some(own), Some(other)) = (&own_account, &trusted_account) {
                if own != other {
                    let account_id = aws_account_root(other);
                    batch.push_node(
                        Node::new(&account_id, NodeKind::Account)
                            .with_label(other.clone())
                            .with_prop(props::ACCOUNT_ID, other.clone()),
                    );
                    batch.push_edge(
                        Edge::new(&role.arn, &account_id, edge_kinds::TRUSTS_CROSS_ACCOUNT)
                            .with_prop(props::PRINCIPAL, &principal)
                            .with_prop(props::CROSS_ACCOUNT, "true"),
                    );
                }
            }
        }
    }
}

fn parse_policies(path: &Path, batch: &mut Batch) -> Result<()> {
    let Some(content) = read_optional(path, batch)? else {
        return Ok(());
    };
    let file: PoliciesFile = serde_json::from_str(&content)
        .map_err(|e| Error::ParseMalformed(format!("{}: {e}", path.display())))?;

    for (i, value) in file.policies.into_iter().enumerate() {
        match serde_json::from_value::<PolicyRecord>(value) {
            Ok(policy) => {
                batch.push_node(
                    Node::new(&policy.arn, NodeKind::Policy)
                        .with_label(&policy.policy_name)
                        .with_prop(props::NAME, &policy.policy_name)
                        .with_prop(props::ARN, &policy.arn),
                );
                if let Some(document) = &policy.document {
                    emit_policy_statements(&policy.arn, document, batch);
                }
            }
            Err(e) => {
                warn!(file = %path.display(), record = i, error = %e, "skipping malformed policy");
                batch.diagnostic(format!("{}: policy record {i}: {e}", path.display()));
            }
        }
    }
    Ok(())
}

/// Emit the statement/permission/resource subgraph for one policy document.
/// Shared with the Terraform plan parser, which synthesizes the same shape.
pub(crate) fn emit_policy_statements(policy_id: &str, document: &PolicyDocument, batch: &mut Batch) {
    for (index, statement) in document.statement.clone().into_vec().into_iter().enumerate() {
        if statement.effect != "Allow" {
            continue;
        }
        let actions = statement.action.map(OneOrMany::into_vec).unwrap_or_default();
        let resources = statement
            .resource
            .map(OneOrMany::into_vec)
            .unwrap_or_default();

        for action in &actions {
            let perm_id = permission_id(policy_id, index, action);
            let wildcard = action.contains('*');
            batch.push_node(
                Node::new(&perm_id, NodeKind::Permission)
                    .with_prop(props::ACTION, action)
                    .with_prop(props::WILDCARD, if wildcard { "true" } else { "false" }),
            );
            batch.push_edge(
                Edge::new(policy_id, &perm_id, edge_kinds::ALLOWS_ACTION)
                    .with_prop(props::STATEMENT_INDEX, index.to_string()),
            );
            for resource in &resources {
                batch.push_node(
                    Node::new(resource, NodeKind::Resource).with_prop(props::ARN, resource),
                );
                batch.push_edge(
                    Edge::new(&perm_id, resource, edge_kinds::APPLIES_TO)
                        .with_prop(props::ACTION, action),
                );
            }
        }
    }
}

fn parse_attachments(path: &Path, batch: &mut Batch) -> Result<()> {
    let Some(content) = read_optional(path, batch)? else {
        return Ok(());
    };
    let file: AttachmentsFile = serde_json::from_str(&content)
        .map_err(|e| Error::ParseMalformed(format!("{}: {e}", path.display())))?;

    for (i, value) in file.attachments.into_iter().enumerate() {
        match serde_json::from_value::<AttachmentRecord>(value) {
            Ok(attachment) => {
                let role_arn = format!(
                    "arn:aws:iam::{DEFAULT_ACCOUNT_ID}:role/{}",
                    attachment.role_name
                );
                batch.push_edge(Edge::new(
                    role_arn,
                    &attachment.policy_arn,
                    edge_kinds::ATTACHED_POLICY,
                ));
            }
            Err(e) => {
                warn!(file = %path.display(), record = i, error = %e, "skipping malformed attachment");
                batch.diagnostic(format!("{}: attachment record {i}: {e}", path.display()));
            }
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TEST_ROLE_ARN: &str = "arn:aws:iam::111111111111:role/TestRole";
    const EXT_ROLE_ARN: &str = "arn:aws:iam::222222222222:role/ExtRole";

    fn write_fixture(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    fn roles_fixture() -> String {
        format!(
            r#"{{"Roles":[{{"RoleName":"TestRole","Arn":"{TEST_ROLE_ARN}","AssumeRolePolicyDocument":{{"Statement":[{{"Effect":"Allow","Principal":{{"AWS":"{EXT_ROLE_ARN}"}},"Action":"sts:AssumeRole"}}]}}}}]}}"#
        )
    }

    #[test]
    fn test_extract_account_id() {
        assert_eq!(
            extract_account_id(TEST_ROLE_ARN),
            Some("111111111111".to_string())
        );
        assert_eq!(extract_account_id("arn:aws:s3:::bucket"), None);
        assert_eq!(extract_account_id("not an arn"), None);
    }

    #[test]
    fn test_cross_account_trust() {
        let dir = TempDir::new().unwrap();
        write_fixture(&dir, "roles.json", &roles_fixture());

        let batch = parse_dir(dir.path()).unwrap();

        let role = batch.nodes.iter().find(|n| n.id == TEST_ROLE_ARN).unwrap();
        assert_eq!(role.kind, NodeKind::Principal);
        assert!(role.has_label(AWS_ROLE_LABEL));
        assert!(role.has_label("TestRole"));

        let account = batch
            .nodes
            .iter()
            .find(|n| n.id == "arn:aws:iam::222222222222:root")
            .unwrap();
        assert_eq!(account.kind, NodeKind::Account);

        let trust = batch
            .edges
            .iter()
            .find(|e| e.kind == edge_kinds::TRUSTS_CROSS_ACCOUNT)
            .unwrap();
        assert_eq!(trust.src, TEST_ROLE_ARN);
        assert_eq!(trust.dst, "arn:aws:iam::222222222222:root");
        assert_eq!(trust.prop(props::PRINCIPAL), Some(EXT_ROLE_ARN));

        let assumes = batch
            .edges
            .iter()
            .find(|e| e.kind == edge_kinds::ASSUMES_ROLE)
            .unwrap();
        assert_eq!(assumes.src, EXT_ROLE_ARN);
        assert_eq!(assumes.dst, TEST_ROLE_ARN);
        assert_eq!(assumes.prop(props::ACTION), Some("sts:AssumeRole"));
    }

    #[test]
    fn test_same_account_trust_is_not_cross_account() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "roles.json",
            &format!(
                r#"{{"Roles":[{{"RoleName":"TestRole","Arn":"{TEST_ROLE_ARN}","AssumeRolePolicyDocument":{{"Statement":{{"Effect":"Allow","Principal":{{"AWS":"arn:aws:iam::111111111111:role/Peer"}}}}}}}}]}}"#
            ),
        );

        let batch = parse_dir(dir.path()).unwrap();
        assert!(!batch
            .edges
            .iter()
            .any(|e| e.kind == edge_kinds::TRUSTS_CROSS_ACCOUNT));
        // The assume edge is still emitted.
        assert!(batch.edges.iter().any(|e| e.kind == edge_kinds::ASSUMES_ROLE));
    }

    #[test]
    fn test_principal_array() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "roles.json",
            &format!(
                r#"{{"Roles":[{{"RoleName":"TestRole","Arn":"{TEST_ROLE_ARN}","AssumeRolePolicyDocument":{{"Statement":[{{"Effect":"Allow","Principal":{{"AWS":["{EXT_ROLE_ARN}","arn:aws:iam::333333333333:root"]}}}}]}}}}]}}"#
            ),
        );

        let batch = parse_dir(dir.path()).unwrap();
        let assumes: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.kind == edge_kinds::ASSUMES_ROLE)
            .collect();
        assert_eq!(assumes.len(), 2);
        let trusts: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.kind == edge_kinds::TRUSTS_CROSS_ACCOUNT)
            .collect();
        assert_eq!(trusts.len(), 2);
    }

    #[test]
    fn test_deny_and_unparseable_principals_skipped() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "roles.json",
            &format!(
                r#"{{"Roles":[{{"RoleName":"TestRole","Arn":"{TEST_ROLE_ARN}","AssumeRolePolicyDocument":{{"Statement":[{{"Effect":"Deny","Principal":{{"AWS":"{EXT_ROLE_ARN}"}}}},{{"Effect":"Allow","Principal":{{"Service":"ec2.amazonaws.com"}}}},{{"Effect":"Allow","Principal":"*"}}]}}}}]}}"#
            ),
        );

        let batch = parse_dir(dir.path()).unwrap();
        assert!(batch.edges.is_empty());
    }

    #[test]
    fn test_wildcard_policy() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "policies.json",
            r#"{"Policies":[{"PolicyName":"TestPolicy","Arn":"arn:aws:iam::111111111111:policy/TestPolicy","Document":{"Statement":[{"Effect":"Allow","Action":"s3:*","Resource":"arn:aws:s3:::test-bucket"}]}}]}"#,
        );

        let batch = parse_dir(dir.path()).unwrap();

        let permission = batch
            .nodes
            .iter()
            .find(|n| n.id == "arn:aws:iam::111111111111:policy/TestPolicy#stmt0#s3:*")
            .unwrap();
        assert_eq!(permission.kind, NodeKind::Permission);
        assert_eq!(permission.prop(props::WILDCARD), Some("true"));
        assert_eq!(permission.prop(props::ACTION), Some("s3:*"));

        let allows = batch
            .edges
            .iter()
            .find(|e| e.kind == edge_kinds::ALLOWS_ACTION)
            .unwrap();
        assert_eq!(allows.src, "arn:aws:iam::111111111111:policy/TestPolicy");
        assert_eq!(allows.prop(props::STATEMENT_INDEX), Some("0"));

        let resource = batch
            .nodes
            .iter()
            .find(|n| n.id == "arn:aws:s3:::test-bucket")
            .unwrap();
        assert_eq!(resource.kind, NodeKind::Resource);

        let applies = batch
            .edges
            .iter()
            .find(|e| e.kind == edge_kinds::APPLIES_TO)
            .unwrap();
        assert_eq!(applies.dst, "arn:aws:s3:::test-bucket");
        assert_eq!(applies.prop(props::ACTION), Some("s3:*"));
    }

    #[test]
    fn test_non_wildcard_action() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "policies.json",
            r#"{"Policies":[{"PolicyName":"P","Arn":"arn:aws:iam::111111111111:policy/P","Document":{"Statement":[{"Effect":"Allow","Action":["s3:GetObject"],"Resource":["arn:aws:s3:::b1","arn:aws:s3:::b2"]}]}}]}"#,
        );

        let batch = parse_dir(dir.path()).unwrap();
        let permission = batch
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Permission)
            .unwrap();
        assert_eq!(permission.prop(props::WILDCARD), Some("false"));

        // One APPLIES_TO edge per resource.
        let applies: Vec<_> = batch
            .edges
            .iter()
            .filter(|e| e.kind == edge_kinds::APPLIES_TO)
            .collect();
        assert_eq!(applies.len(), 2);
    }

    #[test]
    fn test_attachments_assume_fixture_account() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "attachments.json",
            r#"{"Attachments":[{"RoleName":"TestRole","PolicyArn":"arn:aws:iam::111111111111:policy/TestPolicy"}]}"#,
        );

        let batch = parse_dir(dir.path()).unwrap();
        let attached = batch
            .edges
            .iter()
            .find(|e| e.kind == edge_kinds::ATTACHED_POLICY)
            .unwrap();
        assert_eq!(attached.src, TEST_ROLE_ARN);
        assert_eq!(attached.dst, "arn:aws:iam::111111111111:policy/TestPolicy");
    }

    #[test]
    fn test_missing_files_yield_empty_batch() {
        let dir = TempDir::new().unwrap();
        let batch = parse_dir(dir.path()).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.diagnostics.len(), 3);
    }

    #[test]
    fn test_malformed_file_fails_parser() {
        let dir = TempDir::new().unwrap();
        write_fixture(&dir, "roles.json", "not json at all");
        let err = parse_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ParseMalformed(_)));
        assert!(err.to_string().contains("roles.json"));
    }

    #[test]
    fn test_malformed_record_skipped_with_diagnostic() {
        let dir = TempDir::new().unwrap();
        write_fixture(
            &dir,
            "roles.json",
            &format!(
                r#"{{"Roles":[{{"RoleName":"NoArn"}},{{"RoleName":"Good","Arn":"{TEST_ROLE_ARN}"}}]}}"#
            ),
        );

        let batch = parse_dir(dir.path()).unwrap();
        assert!(batch.nodes.iter().any(|n| n.id == TEST_ROLE_ARN));
        assert!(batch
            .diagnostics
            .iter()
            .any(|d| d.contains("role record 0")));
    }
}
