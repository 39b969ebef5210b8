//! Zero-mean multivariate Gaussian sampling for process noise and excitation.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::linalg::cholesky_factor;
use crate::IdentError;

/// Samples `L z` with `z ~ N(0, I)` and `L Lᵀ = covariance`.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    covariance: DMatrix<f64>,
    factor: DMatrix<f64>,
}

impl GaussianNoise {
    pub fn new(covariance: DMatrix<f64>, context: &'static str) -> Result<Self, IdentError> {
        let factor = cholesky_factor(&covariance, context)?;
        Ok(Self { covariance, factor })
    }

    pub fn dim(&self) -> usize {
        self.covariance.nrows()
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::<f64>::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        &self.factor * z
    }
}
