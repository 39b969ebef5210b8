use nalgebra::DMatrix;

use crate::system::LtiSystem;
use crate::trajectory::Trajectory;
use crate::IdentError;

pub mod erm;
pub mod ols;

pub use erm::EmpiricalRiskMinimizer;
pub use ols::OrdinaryLeastSquares;

pub const ESTIMATOR_ORDER: [EstimatorKind; 2] = [EstimatorKind::Erm, EstimatorKind::Ols];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimatorKind {
    Erm,
    Ols,
}

impl EstimatorKind {
    pub fn name(self) -> &'static str {
        match self {
            EstimatorKind::Erm => "ERM",
            EstimatorKind::Ols => "OLS",
        }
    }

    /// Construct a fresh estimator of this kind over `candidates`.
    pub fn build<'a>(
        self,
        candidates: &'a [LtiSystem],
        sigma_w: &DMatrix<f64>,
    ) -> Result<Box<dyn Estimator + 'a>, IdentError> {
        let estimator: Box<dyn Estimator + 'a> = match self {
            EstimatorKind::Erm => Box::new(EmpiricalRiskMinimizer::new(candidates, sigma_w)?),
            EstimatorKind::Ols => Box::new(OrdinaryLeastSquares::new(candidates)?),
        };
        Ok(estimator)
    }
}

/// Candidate picked by an estimator together with its score (risk or distance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub score: f64,
}

pub trait Estimator {
    fn kind(&self) -> EstimatorKind;

    /// Score every candidate against `trajectory` and keep the best one.
    fn fit(&mut self, trajectory: &Trajectory) -> Result<Selection, IdentError>;

    /// Result of the last successful `fit`.
    fn best_selection(&self) -> Option<Selection>;

    fn best_candidate(&self) -> Option<usize> {
        self.best_selection().map(|s| s.index)
    }

    fn best_score(&self) -> Option<f64> {
        self.best_selection().map(|s| s.score)
    }
}

/// First strict minimum of `scores`; NaN scores never win.
///
/// Returns `None` only for an empty input. If every score is NaN the first
/// candidate is reported.
pub(crate) fn select_min(scores: &[f64]) -> Option<Selection> {
    let mut best: Option<Selection> = None;
    for (index, &score) in scores.iter().enumerate() {
        let improves = match best {
            None => !score.is_nan(),
            Some(current) => score < current.score,
        };
        if improves {
            best = Some(Selection { index, score });
        }
    }
    best.or_else(|| scores.first().map(|&score| Selection { index: 0, score }))
}

pub(crate) fn ensure_candidates(candidates: &[LtiSystem]) -> Result<(), IdentError> {
    if candidates.is_empty() {
        return Err(IdentError::EmptyCandidateSet);
    }
    Ok(())
}

pub(crate) fn ensure_transitions(trajectory: &Trajectory) -> Result<(), IdentError> {
    trajectory.validate()?;
    if trajectory.horizon() == 0 {
        return Err(IdentError::InvalidConfig(
            "trajectory must contain at least one transition".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_the_lowest_index() {
        let s = select_min(&[0.5, 0.2, 0.2, 0.9]).unwrap();
        assert_eq!(s.index, 1);
        assert_eq!(s.score, 0.2);
    }

    #[test]
    fn nan_never_wins() {
        let s = select_min(&[f64::NAN, 3.0, f64::NAN, 1.0]).unwrap();
        assert_eq!(s.index, 3);

        let s = select_min(&[f64::NAN, f64::NAN]).unwrap();
        assert_eq!(s.index, 0);

        assert!(select_min(&[]).is_none());
    }

    #[test]
    fn infinite_scores_still_select() {
        let s = select_min(&[f64::INFINITY, f64::INFINITY]).unwrap();
        assert_eq!(s.index, 0);
    }

    #[test]
    fn kinds_have_stable_names() {
        let names: Vec<_> = ESTIMATOR_ORDER.iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["ERM", "OLS"]);
    }
}
