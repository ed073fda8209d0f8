//! Monte Carlo simulation of legitimate and counterfeit pharmaceutical
//! shipments moving through imported and local supply chains.

pub mod closed_form;
pub mod config;
pub mod error;
pub mod models;
pub mod monte_carlo;
pub mod regression;
pub mod reporting;
pub mod sampling;
pub mod simulation;

pub use config::{BucketingMode, JourneyStrategy, SimulationConfig};
pub use error::{ConfigError, RegressionError};
pub use models::{RunResult, SimulationSummary, StageProbabilities, SupplyPath};
pub use monte_carlo::{collect_regression_dataset, run_monte_carlo};
pub use simulation::JourneyModel;
