//! Empirical risk minimizer over a finite candidate class.
//!
//! The risk of a candidate is its mean one-step-ahead prediction error under
//! the process-noise Mahalanobis norm:
//!
//! `R(θ) = (1/T) Σ_t (x̂_{t+1} - x_{t+1})ᵀ Σ_w⁻¹ (x̂_{t+1} - x_{t+1})`
//!
//! with `x̂_{t+1} = A x_t + B u_t` computed from the candidate's own matrices.

use nalgebra::{DMatrix, DVector};

use crate::estimator::{
    ensure_candidates, ensure_transitions, select_min, Estimator, EstimatorKind, Selection,
};
use crate::linalg::{ensure_shape, inverse};
use crate::system::{DiscreteSystem, LtiSystem};
use crate::trajectory::Trajectory;
use crate::IdentError;

pub struct EmpiricalRiskMinimizer<'a> {
    candidates: &'a [LtiSystem],
    sigma_w_inv: DMatrix<f64>,
    best: Option<Selection>,
}

impl<'a> EmpiricalRiskMinimizer<'a> {
    /// Fails if the candidate set is empty or `sigma_w` is not an invertible
    /// `n_x × n_x` matrix.
    pub fn new(candidates: &'a [LtiSystem], sigma_w: &DMatrix<f64>) -> Result<Self, IdentError> {
        ensure_candidates(candidates)?;
        let n_x = candidates[0].state_dim();
        ensure_shape(sigma_w, (n_x, n_x), "process noise covariance sigma_w")?;
        let sigma_w_inv = inverse(sigma_w, "process noise covariance sigma_w")?;
        Ok(Self {
            candidates,
            sigma_w_inv,
            best: None,
        })
    }

    pub fn empirical_risk(
        &self,
        system: &LtiSystem,
        trajectory: &Trajectory,
    ) -> Result<f64, IdentError> {
        ensure_transitions(trajectory)?;
        trajectory.ensure_dims(system.state_dim(), system.input_dim())?;

        let zero = DVector::<f64>::zeros(system.state_dim());
        let mut total = 0.0;
        for (t, u) in trajectory.inputs.iter().enumerate() {
            let predicted = system.simulate_step(&trajectory.states[t], u, &zero)?;
            let residual = predicted - &trajectory.states[t + 1];
            total += residual.dot(&(&self.sigma_w_inv * &residual));
        }
        Ok(total / trajectory.horizon() as f64)
    }

    /// Risk of every candidate, in candidate order.
    pub fn risks(&self, trajectory: &Trajectory) -> Result<Vec<f64>, IdentError> {
        self.candidates
            .iter()
            .map(|system| self.empirical_risk(system, trajectory))
            .collect()
    }
}

impl Estimator for EmpiricalRiskMinimizer<'_> {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Erm
    }

    fn fit(&mut self, trajectory: &Trajectory) -> Result<Selection, IdentError> {
        let risks = self.risks(trajectory)?;
        let selection = select_min(&risks).ok_or(IdentError::EmptyCandidateSet)?;
        self.best = Some(selection);
        Ok(selection)
    }

    fn best_selection(&self) -> Option<Selection> {
        self.best
    }
}
