//! Least-squares parameter estimate followed by nearest-candidate matching.
//!
//! `θ̂ = (XᵀX)⁻¹ Xᵀ X⁺` with regressor rows `[x_tᵀ u_tᵀ]` and target rows
//! `x_{t+1}ᵀ`; the selected candidate minimizes `‖θ̂ - [Aᵀ; Bᵀ]‖₂`.

use nalgebra::DMatrix;

use crate::estimator::{
    ensure_candidates, ensure_transitions, select_min, Estimator, EstimatorKind, Selection,
};
use crate::linalg::{inverse, spectral_norm};
use crate::system::{DiscreteSystem, LtiSystem};
use crate::trajectory::Trajectory;
use crate::IdentError;

pub struct OrdinaryLeastSquares<'a> {
    candidates: &'a [LtiSystem],
    best: Option<Selection>,
}

impl<'a> OrdinaryLeastSquares<'a> {
    pub fn new(candidates: &'a [LtiSystem]) -> Result<Self, IdentError> {
        ensure_candidates(candidates)?;
        Ok(Self {
            candidates,
            best: None,
        })
    }

    /// Fails with `SingularMatrix` when the data are not exciting enough
    /// (or too short) for `XᵀX` to be invertible.
    pub fn least_squares(&self, trajectory: &Trajectory) -> Result<DMatrix<f64>, IdentError> {
        ensure_transitions(trajectory)?;
        let reference = &self.candidates[0];
        trajectory.ensure_dims(reference.state_dim(), reference.input_dim())?;
        if trajectory.horizon() < reference.state_dim() + reference.input_dim() {
            return Err(IdentError::SingularMatrix {
                context: "regressor Gram matrix XᵀX",
            });
        }

        let x = trajectory.regressors();
        let xp = trajectory.targets();
        let xt = x.transpose();
        let gram_inv = inverse(&(&xt * &x), "regressor Gram matrix XᵀX")?;
        Ok(gram_inv * (&xt * &xp))
    }

    /// Spectral distance from `theta_hat` to every candidate, in candidate order.
    pub fn distances(&self, theta_hat: &DMatrix<f64>) -> Result<Vec<f64>, IdentError> {
        self.candidates
            .iter()
            .map(|system| {
                let theta = system.parameters();
                if theta.shape() != theta_hat.shape() {
                    return Err(IdentError::ShapeMismatch {
                        context: "candidate parameter matrix",
                        expected: theta_hat.shape(),
                        got: theta.shape(),
                    });
                }
                Ok(spectral_norm(&(theta_hat - theta)))
            })
            .collect()
    }
}

impl Estimator for OrdinaryLeastSquares<'_> {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Ols
    }

    fn fit(&mut self, trajectory: &Trajectory) -> Result<Selection, IdentError> {
        let theta_hat = self.least_squares(trajectory)?;
        let distances = self.distances(&theta_hat)?;
        let selection = select_min(&distances).ok_or(IdentError::EmptyCandidateSet)?;
        self.best = Some(selection);
        Ok(selection)
    }

    fn best_selection(&self) -> Option<Selection> {
        self.best
    }
}
