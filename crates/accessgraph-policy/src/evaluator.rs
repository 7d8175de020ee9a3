//! Rule-evaluator interface and HTTP client.
//!
//! The rule engine is an external process so policy updates never require
//! rebuilding this crate. The core posts `{"input": <facts>}` and expects
//! `{"result": {"violations": [Finding, ...]}}` back. Non-2xx responses are
//! evaluator errors; a request deadline surfaces as a cancellation.

use crate::projection::Projection;
use accessgraph::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Default deadline for evaluator calls (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Finding severity. LOW and MEDIUM are informational; HIGH is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single policy violation reported by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub severity: Severity,
    #[serde(rename = "entityRef")]
    pub entity_ref: String,
    pub reason: String,
    pub remediation: String,
}

/// Something that can turn a fact object into findings.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, facts: &Projection) -> Result<Vec<Finding>>;
}

#[derive(Serialize)]
struct EvaluateRequest<'a> {
    input: &'a Projection,
}

#[derive(Deserialize)]
struct EvaluateResponse {
    #[serde(default)]
    result: EvaluateResult,
}

#[derive(Default, Deserialize)]
struct EvaluateResult {
    #[serde(default)]
    violations: Vec<Finding>,
}

/// HTTP evaluator client.
#[derive(Clone, Debug)]
pub struct HttpEvaluator {
    inner: Arc<EvaluatorInner>,
}

#[derive(Debug)]
struct EvaluatorInner {
    http_client: reqwest::Client,
    url: String,
}

impl HttpEvaluator {
    /// Create a new evaluator builder.
    #[must_use]
    pub fn builder() -> HttpEvaluatorBuilder {
        HttpEvaluatorBuilder::default()
    }

    /// The evaluator endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, facts: &Projection) -> Result<Vec<Finding>> {
        debug!(url = %self.inner.url, "posting facts to evaluator");

        let response = self
            .inner
            .http_client
            .post(&self.inner.url)
            .json(&EvaluateRequest { input: facts })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Canceled(e.to_string())
                } else {
                    Error::Evaluator(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("evaluator returned {} - {}", status, body);
            return Err(Error::Evaluator(format!("HTTP {status}: {body}")));
        }

        let parsed: EvaluateResponse = response
            .json()
            .await
            .map_err(|e| Error::Evaluator(format!("invalid evaluator response: {e}")))?;

        debug!(count = parsed.result.violations.len(), "evaluator returned findings");
        Ok(parsed.result.violations)
    }
}

/// Builder for [`HttpEvaluator`].
#[derive(Default)]
pub struct HttpEvaluatorBuilder {
    url: Option<String>,
    timeout: Option<Duration>,
}

impl HttpEvaluatorBuilder {
    /// Set the evaluator endpoint URL (required).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the request deadline. Defaults to [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpEvaluator> {
        let url = self
            .url
            .ok_or_else(|| Error::Evaluator("evaluator URL is required".to_string()))?;
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Evaluator(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpEvaluator {
            inner: Arc::new(EvaluatorInner { http_client, url }),
        })
    }
}

/// Evaluator that returns a fixed set of findings. Used in tests and for
/// dry runs without a rule engine.
#[derive(Debug, Clone, Default)]
pub struct StaticEvaluator {
    findings: Vec<Finding>,
}

impl StaticEvaluator {
    #[must_use]
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

#[async_trait]
impl Evaluator for StaticEvaluator {
    async fn evaluate(&self, _facts: &Projection) -> Result<Vec<Finding>> {
        Ok(self.findings.clone())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn finding(rule_id: &str, severity: Severity) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            severity,
            entity_ref: "arn:aws:iam::111111111111:role/TestRole".to_string(),
            reason: "role trusts another account".to_string(),
            remediation: "restrict the trust policy".to_string(),
        }
    }

    #[test]
    fn test_severity_serde() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"HIGH\"");
        let s: Severity = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(s, Severity::Low);
    }

    #[test]
    fn test_finding_wire_field_names() {
        let json = serde_json::to_value(finding("cross-account-trust", Severity::High)).unwrap();
        assert!(json.get("ruleId").is_some());
        assert!(json.get("entityRef").is_some());
        assert_eq!(json["severity"], "HIGH");
    }

    #[test]
    fn test_builder_requires_url() {
        assert!(HttpEvaluator::builder().build().is_err());
        let evaluator = HttpEvaluator::builder()
            .url("http://localhost:9090/evaluate")
            .build()
            .unwrap();
        assert_eq!(evaluator.url(), "http://localhost:9090/evaluate");
    }

    #[tokio::test]
    async fn test_static_evaluator() {
        let evaluator = StaticEvaluator::new(vec![finding("r1", Severity::Low)]);
        let findings = evaluator.evaluate(&Projection::default()).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "r1");
    }

    #[tokio::test]
    async fn test_http_evaluator_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/evaluate"))
            .and(body_partial_json(serde_json::json!({"input": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "violations": [{
                        "ruleId": "cross-account-trust",
                        "severity": "HIGH",
                        "entityRef": "arn:aws:iam::111111111111:role/TestRole",
                        "reason": "role trusts account 222222222222",
                        "remediation": "restrict the trust policy"
                    }]
                }
            })))
            .mount(&server)
            .await;

        let evaluator = HttpEvaluator::builder()
            .url(format!("{}/evaluate", server.uri()))
            .build()
            .unwrap();

        let findings = evaluator.evaluate(&Projection::default()).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].rule_id, "cross-account-trust");
    }

    #[tokio::test]
    async fn test_http_evaluator_empty_violations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": {}})),
            )
            .mount(&server)
            .await;

        let evaluator = HttpEvaluator::builder().url(server.uri()).build().unwrap();
        let findings = evaluator.evaluate(&Projection::default()).await.unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_http_evaluator_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("engine exploded"))
            .mount(&server)
            .await;

        let evaluator = HttpEvaluator::builder().url(server.uri()).build().unwrap();
        let err = evaluator.evaluate(&Projection::default()).await.unwrap_err();
        assert!(matches!(err, Error::Evaluator(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_http_evaluator_timeout_is_canceled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"result": {"violations": []}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let evaluator = HttpEvaluator::builder()
            .url(server.uri())
            .timeout(Duration::from_millis(25))
            .build()
            .unwrap();

        let err = evaluator.evaluate(&Projection::default()).await.unwrap_err();
        assert!(matches!(err, Error::Canceled(_)));
    }

    #[tokio::test]
    async fn test_http_evaluator_malformed_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let evaluator = HttpEvaluator::builder().url(server.uri()).build().unwrap();
        let err = evaluator.evaluate(&Projection::default()).await.unwrap_err();
        assert!(matches!(err, Error::Evaluator(_)));
    }
}
