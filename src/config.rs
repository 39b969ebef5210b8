use std::fs;
use std::path::Path;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::experiment::ExperimentSetup;
use crate::linalg::{matrix_from_rows, matrix_to_rows};
use crate::system::LtiSystem;
use crate::IdentError;

pub const DEFAULT_DELTA: f64 = 0.05;
pub const DEFAULT_RUNS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_HORIZONS: [usize; 2] = [10, 20];

/// Row-major `A` and `B` of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
}

impl SystemSpec {
    pub fn build(&self) -> Result<LtiSystem, IdentError> {
        LtiSystem::new(
            matrix_from_rows(&self.a, "state transition matrix A")?,
            matrix_from_rows(&self.b, "input matrix B")?,
        )
    }

    pub fn from_system(system: &LtiSystem) -> Self {
        Self {
            a: matrix_to_rows(system.a()),
            b: matrix_to_rows(system.b()),
        }
    }
}

/// A full horizon sweep: candidate class (index 0 is the true system), noise
/// and excitation covariances, horizons and Monte Carlo settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentPlan {
    pub name: String,
    pub horizons: Vec<usize>,
    #[serde(default = "default_delta")]
    pub delta: f64,
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub threads: Option<usize>,
    pub systems: Vec<SystemSpec>,
    pub sigma_w: Vec<Vec<f64>>,
    pub sigma_u: Vec<Vec<f64>>,
}

fn default_delta() -> f64 {
    DEFAULT_DELTA
}

fn default_runs() -> usize {
    DEFAULT_RUNS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        let reference = reference_systems();
        Self {
            name: "dataExp1".to_string(),
            horizons: DEFAULT_HORIZONS.to_vec(),
            delta: DEFAULT_DELTA,
            runs: DEFAULT_RUNS,
            seed: DEFAULT_SEED,
            threads: None,
            systems: reference,
            sigma_w: diagonal(&[0.1, 0.1, 0.1]),
            sigma_u: diagonal(&[10.0, 0.1]),
        }
    }
}

impl ExperimentPlan {
    /// Reference experiments 1, 2 and 3 over the same three candidates.
    ///
    /// | exp | sigma_w | sigma_u |
    /// |---|---|---|
    /// | 1 | `0.1 I` | `diag(10, 0.1)` |
    /// | 2 | `0.1 I` | `diag(0.1, 10)` |
    /// | 3 | `diag(10, 0.1, 0.001)` | `diag(10, 0.1)` |
    pub fn preset(exp: u8) -> Result<Self, IdentError> {
        let (sigma_w, sigma_u) = match exp {
            1 => (diagonal(&[0.1, 0.1, 0.1]), diagonal(&[10.0, 0.1])),
            2 => (diagonal(&[0.1, 0.1, 0.1]), diagonal(&[0.1, 10.0])),
            3 => (diagonal(&[10.0, 0.1, 0.001]), diagonal(&[10.0, 0.1])),
            other => {
                return Err(IdentError::InvalidConfig(format!(
                    "unknown experiment {other}, expected 1, 2 or 3"
                )))
            }
        };
        Ok(Self {
            name: format!("dataExp{exp}"),
            sigma_w,
            sigma_u,
            ..Self::default()
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, IdentError> {
        let plan: ExperimentPlan = toml::from_str(raw)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, IdentError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), IdentError> {
        if self.name.trim().is_empty() {
            return Err(IdentError::InvalidConfig(
                "name must be non-empty".to_string(),
            ));
        }
        if self.horizons.is_empty() {
            return Err(IdentError::InvalidConfig(
                "horizons must be non-empty".to_string(),
            ));
        }
        if self.horizons.iter().any(|&h| h == 0) {
            return Err(IdentError::InvalidConfig(
                "all horizons must be > 0".to_string(),
            ));
        }
        if self.runs == 0 {
            return Err(IdentError::InvalidConfig("runs must be > 0".to_string()));
        }
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(IdentError::InvalidConfig(format!(
                "delta must be in (0, 1), got {}",
                self.delta
            )));
        }
        if self.threads == Some(0) {
            return Err(IdentError::InvalidConfig(
                "threads must be > 0 when set".to_string(),
            ));
        }
        if self.systems.is_empty() {
            return Err(IdentError::EmptyCandidateSet);
        }
        // Shapes, covariances and candidate dimensions.
        self.setup(self.horizons[0]).map(|_| ())
    }

    pub fn candidate_systems(&self) -> Result<Vec<LtiSystem>, IdentError> {
        self.systems.iter().map(SystemSpec::build).collect()
    }

    pub fn sigma_w_matrix(&self) -> Result<DMatrix<f64>, IdentError> {
        matrix_from_rows(&self.sigma_w, "process noise covariance sigma_w")
    }

    pub fn sigma_u_matrix(&self) -> Result<DMatrix<f64>, IdentError> {
        matrix_from_rows(&self.sigma_u, "excitation covariance sigma_u")
    }

    pub fn setup(&self, horizon: usize) -> Result<ExperimentSetup, IdentError> {
        ExperimentSetup::new(
            self.candidate_systems()?,
            horizon,
            self.sigma_w_matrix()?,
            self.sigma_u_matrix()?,
        )
    }

    /// Batch seed for the `index`-th horizon of the sweep.
    pub fn horizon_seed(&self, index: usize) -> u64 {
        self.seed ^ ((index as u64) << 32)
    }
}

fn reference_systems() -> Vec<SystemSpec> {
    let b = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
    let a = |a00: f64, a22: f64| {
        vec![
            vec![a00, 0.1, 0.0],
            vec![0.0, 0.2, 0.0],
            vec![0.0, 0.0, a22],
        ]
    };
    vec![
        SystemSpec { a: a(0.2, 0.5), b: b.clone() },
        SystemSpec { a: a(0.1, 0.5), b: b.clone() },
        SystemSpec { a: a(0.2, 0.6), b },
    ]
}

fn diagonal(values: &[f64]) -> Vec<Vec<f64>> {
    (0..values.len())
        .map(|i| {
            (0..values.len())
                .map(|j| if i == j { values[i] } else { 0.0 })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::DiscreteSystem;

    #[test]
    fn presets_are_valid() {
        for exp in 1..=3 {
            let plan = ExperimentPlan::preset(exp).unwrap();
            plan.validate().unwrap();
            assert_eq!(plan.name, format!("dataExp{exp}"));
            assert_eq!(plan.horizons, vec![10, 20]);
            assert_eq!(plan.runs, 1000);
            assert_eq!(plan.seed, 42);

            let systems = plan.candidate_systems().unwrap();
            assert_eq!(systems.len(), 3);
            assert!(systems.iter().all(|s| s.state_dim() == 3 && s.input_dim() == 2));
        }
        assert!(ExperimentPlan::preset(4).is_err());
    }

    #[test]
    fn preset_covariances() {
        let exp2 = ExperimentPlan::preset(2).unwrap();
        assert_eq!(exp2.sigma_u_matrix().unwrap()[(1, 1)], 10.0);
        let exp3 = ExperimentPlan::preset(3).unwrap();
        assert_eq!(exp3.sigma_w_matrix().unwrap()[(2, 2)], 0.001);
    }

    #[test]
    fn bundled_config_matches_preset() {
        let plan =
            ExperimentPlan::from_toml_str(include_str!("../configs/experiment1.toml")).unwrap();
        let preset = ExperimentPlan::preset(1).unwrap();
        assert_eq!(plan.systems, preset.systems);
        assert_eq!(plan.sigma_w, preset.sigma_w);
        assert_eq!(plan.sigma_u, preset.sigma_u);
        assert_eq!(plan.delta, preset.delta);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let raw = r#"
            name = "scalar"
            horizons = [50]
            sigma_w = [[0.5]]
            sigma_u = [[1.0]]

            [[systems]]
            a = [[0.9]]
            b = [[1.0]]

            [[systems]]
            a = [[0.8]]
            b = [[1.0]]
        "#;
        let plan = ExperimentPlan::from_toml_str(raw).unwrap();
        assert_eq!(plan.delta, DEFAULT_DELTA);
        assert_eq!(plan.runs, DEFAULT_RUNS);
        assert_eq!(plan.threads, None);
        assert_eq!(plan.setup(50).unwrap().systems().len(), 2);
    }

    #[test]
    fn invalid_plans_are_rejected() {
        let base = ExperimentPlan::preset(1).unwrap();

        let mut plan = base.clone();
        plan.delta = 1.0;
        assert!(matches!(plan.validate(), Err(IdentError::InvalidConfig(_))));

        let mut plan = base.clone();
        plan.horizons = vec![10, 0];
        assert!(plan.validate().is_err());

        let mut plan = base.clone();
        plan.runs = 0;
        assert!(plan.validate().is_err());

        let mut plan = base.clone();
        plan.systems[1].a[2].pop();
        assert!(matches!(
            plan.validate(),
            Err(IdentError::DimensionMismatch { .. })
        ));

        let mut plan = base.clone();
        plan.sigma_u = diagonal(&[1.0, -1.0]);
        assert!(matches!(
            plan.validate(),
            Err(IdentError::NotPositiveDefinite { .. })
        ));

        let mut plan = base;
        plan.systems.clear();
        assert!(matches!(plan.validate(), Err(IdentError::EmptyCandidateSet)));
    }

    #[test]
    fn malformed_toml_is_a_toml_error() {
        assert!(matches!(
            ExperimentPlan::from_toml_str("name = "),
            Err(IdentError::Toml(_))
        ));
    }

    #[test]
    fn horizon_seeds_are_distinct() {
        let plan = ExperimentPlan::default();
        assert_eq!(plan.horizon_seed(0), 42);
        assert_ne!(plan.horizon_seed(1), plan.horizon_seed(0));
    }

    #[test]
    fn system_spec_round_trips_through_matrices() {
        let plan = ExperimentPlan::default();
        let systems = plan.candidate_systems().unwrap();
        assert_eq!(SystemSpec::from_system(&systems[2]), plan.systems[2]);
    }
}
