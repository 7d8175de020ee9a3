//! # AccessGraph Policy
//!
//! Projects a loaded graph into the compact fact object the rule engine
//! consumes, and defines the evaluator boundary: an async trait, an HTTP
//! client implementation, and a static implementation for tests.

pub mod evaluator;
pub mod projection;

pub use evaluator::{
    Evaluator, Finding, HttpEvaluator, HttpEvaluatorBuilder, Severity, StaticEvaluator,
    DEFAULT_TIMEOUT,
};
pub use projection::{
    build_projection, BindingFacts, K8sFacts, PolicyFacts, Projection, RoleFacts, TrustFacts,
};
