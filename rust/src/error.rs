//! Error types for the traveling network engine and its trial driver.

use crate::tree::{EdgeId, NodeId};

/// Rejected simulation parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("target length must be positive, got {0}")]
    NonPositiveTarget(f64),

    #[error("rate `{name}` must be non-negative, got {value}")]
    NegativeRate { name: &'static str, value: f64 },

    #[error("length increment must be positive, got {0}")]
    NonPositiveIncrement(f64),

    #[error("parameter `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
}

/// Failures raised by the tree engine.
///
/// Everything except `Config` means a structural invariant was broken.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("node {0} does not exist")]
    MissingNode(NodeId),

    #[error("edge {0} does not exist")]
    MissingEdge(EdgeId),

    #[error("node {0} has no incoming edge")]
    Detached(NodeId),

    #[error("node {0} still has children and cannot be removed")]
    NotALeaf(NodeId),

    #[error("tree invariant violated: {0}")]
    Invariant(String),
}

/// Failures of the equilibrium-size root solver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("solver input out of domain: {0}")]
    InvalidInput(String),

    #[error("Newton iteration did not converge after {iterations} steps (last estimate {last})")]
    NotConverged { iterations: usize, last: f64 },
}

/// Failures of the confidence-interval computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("need at least two samples, got {0}")]
    TooFewSamples(usize),

    #[error("confidence level must lie in (0, 1), got {0}")]
    InvalidLevel(f64),

    #[error("distribution error: {0}")]
    Distribution(String),
}

impl From<statrs::StatsError> for StatsError {
    fn from(e: statrs::StatsError) -> Self {
        StatsError::Distribution(e.to_string())
    }
}

/// Failures of a multi-trial run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("sampling window must contain at least one step")]
    EmptySampleWindow,

    #[error("only {survivors} of {trials} trials survived without collapsing")]
    TooFewSurvivors { survivors: usize, trials: usize },
}
