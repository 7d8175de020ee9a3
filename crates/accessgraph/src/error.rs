use thiserror::Error;

/// Error taxonomy shared by the AccessGraph crates.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A whole document was rejected by a parser.
    #[error("malformed document: {0}")]
    ParseMalformed(String),

    /// An edge referenced a node that is not present in the graph.
    #[error("edge endpoint not found: {0}")]
    MissingEndpoint(String),

    /// A node or snapshot lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// No directed path exists between the endpoints.
    #[error("no path from {from} to {to}")]
    NoPath { from: String, to: String },

    /// The discovered path is longer than the caller's hop budget.
    #[error("path of {hops} hops exceeds max hops {max_hops}")]
    ExceedsMaxHops { hops: usize, max_hops: usize },

    /// Attack-path search needs either an explicit target or a sensitive tag.
    #[error("attack path requires a target node or the \"sensitive\" tag")]
    MissingTarget,

    /// The recommender was invoked on a policy with no attached principals.
    #[error("policy {0} has no attached principals")]
    NoPrincipals(String),

    /// Transactional storage failure, wrapping the underlying cause.
    #[error("storage error: {0}")]
    Storage(String),

    /// Non-OK response from the policy evaluator.
    #[error("evaluator error: {0}")]
    Evaluator(String),

    /// The caller canceled the operation or its deadline elapsed.
    #[error("operation canceled: {0}")]
    Canceled(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

/// Result type for AccessGraph operations
pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_endpoint_display() {
        let error = Error::MissingEndpoint("arn:aws:iam::111111111111:role/Ghost".to_string());
        assert_eq!(
            error.to_string(),
            "edge endpoint not found: arn:aws:iam::111111111111:role/Ghost"
        );
    }

    #[test]
    fn test_no_path_display() {
        let error = Error::NoPath {
            from: "a".to_string(),
            to: "b".to_string(),
        };
        assert_eq!(error.to_string(), "no path from a to b");
    }

    #[test]
    fn test_exceeds_max_hops_display() {
        let error = Error::ExceedsMaxHops {
            hops: 3,
            max_hops: 1,
        };
        assert_eq!(error.to_string(), "path of 3 hops exceeds max hops 1");
    }

    #[test]
    fn test_missing_target_display() {
        assert!(Error::MissingTarget.to_string().contains("sensitive"));
    }

    #[test]
    fn test_io_error_from() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);
        assert!(matches!(error, Error::Io(_)));
        assert!(error.to_string().contains("IO error"));
    }

    #[test]
    fn test_json_error_from() {
        let json_error = serde_json::from_str::<i32>("not valid json").unwrap_err();
        let error = Error::from(json_error);
        assert!(matches!(error, Error::Json(_)));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_propagation() {
        fn might_fail() -> Result<i32> {
            Err(Error::NotFound("snap-1".to_string()))
        }

        fn calls_might_fail() -> Result<i32> {
            might_fail()?;
            Ok(42)
        }

        let result = calls_might_fail();
        assert!(matches!(result.unwrap_err(), Error::NotFound(_)));
    }
}
