/// Error types for configuration and the regression collaborator

use crate::models::SupplyPath;

/// Errors raised before any simulation work begins
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("num_sims must be at least 1")]
    ZeroSimulations,

    #[error("shipments per run must be at least 1")]
    ZeroShipments,

    #[error("at least one supply path must be selected")]
    NoPaths,

    #[error("invalid prior for {name}: {reason}")]
    InvalidPrior { name: &'static str, reason: String },

    #[error("invalid transit parameter {name}: {reason}")]
    InvalidTransit { name: &'static str, reason: String },

    #[error("probability {name} = {value} is outside [0, 1]")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("stage probabilities drawn for the {found} path cannot drive the {expected} path")]
    PathMismatch {
        expected: SupplyPath,
        found: SupplyPath,
    },

    #[error("{strategy} strategy does not support {bucketing} bucketing")]
    UnsupportedMode {
        strategy: &'static str,
        bucketing: &'static str,
    },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from fitting the standardized least-squares model
#[derive(Debug, thiserror::Error)]
pub enum RegressionError {
    #[error("regression table has no rows")]
    EmptyTable,

    #[error("row {row} has {found} features, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("least-squares solve failed: {0}")]
    Solve(String),
}
