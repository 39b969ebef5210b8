//! LTI-SYSID - finite-class identification of discrete-time LTI systems
//!
//! Monte Carlo tooling that compares an empirical risk minimizer and an
//! ordinary least squares estimator at picking the true member of a finite
//! set of candidate systems `x' = A x + B u + w`, and evaluates two
//! closed-form sample-size conditions that predict when the identification
//! succeeds with probability at least `1 - delta`.

pub mod bounds;
pub mod config;
pub mod estimator;
pub mod experiment;
pub mod io;
pub mod linalg;
pub mod noise;
pub mod pool;
pub mod sweep;
pub mod system;
pub mod trajectory;

use thiserror::Error;

pub use bounds::{check_lower, check_upper, lower_bound_report, upper_bound_report, BoundReport};
pub use config::ExperimentPlan;
pub use estimator::{
    EmpiricalRiskMinimizer, Estimator, EstimatorKind, OrdinaryLeastSquares, Selection,
};
pub use experiment::{
    generate_trajectory, run_experiment, run_experiments, BatchResult, EstimationOutcome,
    ExperimentSetup, SelectionFrequencies,
};
pub use noise::GaussianNoise;
pub use pool::TrialPool;
pub use sweep::{run_sweep, HorizonRow};
pub use system::{DiscreteSystem, LtiSystem};
pub use trajectory::Trajectory;

#[derive(Debug, Error)]
pub enum IdentError {
    #[error("{context}: dimension mismatch, expected {expected}, got {got}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{context}: shape mismatch, expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("{context}: matrix is singular")]
    SingularMatrix { context: &'static str },
    #[error("{context}: matrix is not symmetric positive definite")]
    NotPositiveDefinite { context: &'static str },
    #[error("candidate set is empty")]
    EmptyCandidateSet,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
