use nalgebra::{DMatrix, DVector};

use crate::IdentError;

/// One observed rollout: `T + 1` states and the `T` inputs that drove them.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Vec<DVector<f64>>,
    pub inputs: Vec<DVector<f64>>,
}

impl Trajectory {
    pub fn new(states: Vec<DVector<f64>>, inputs: Vec<DVector<f64>>) -> Result<Self, IdentError> {
        let trajectory = Self { states, inputs };
        trajectory.validate()?;
        Ok(trajectory)
    }

    /// Number of transitions `T`.
    pub fn horizon(&self) -> usize {
        self.inputs.len()
    }

    pub fn state_dim(&self) -> usize {
        self.states.first().map_or(0, DVector::len)
    }

    pub fn input_dim(&self) -> usize {
        self.inputs.first().map_or(0, DVector::len)
    }

    pub fn validate(&self) -> Result<(), IdentError> {
        if self.states.len() != self.inputs.len() + 1 {
            return Err(IdentError::DimensionMismatch {
                context: "trajectory state count",
                expected: self.inputs.len() + 1,
                got: self.states.len(),
            });
        }
        let n_x = self.state_dim();
        if let Some(bad) = self.states.iter().find(|x| x.len() != n_x) {
            return Err(IdentError::DimensionMismatch {
                context: "trajectory state",
                expected: n_x,
                got: bad.len(),
            });
        }
        let n_u = self.input_dim();
        if let Some(bad) = self.inputs.iter().find(|u| u.len() != n_u) {
            return Err(IdentError::DimensionMismatch {
                context: "trajectory input",
                expected: n_u,
                got: bad.len(),
            });
        }
        Ok(())
    }

    /// Checks the trajectory against a system's `(n_x, n_u)`.
    pub fn ensure_dims(&self, n_x: usize, n_u: usize) -> Result<(), IdentError> {
        self.validate()?;
        if self.state_dim() != n_x {
            return Err(IdentError::DimensionMismatch {
                context: "trajectory state",
                expected: n_x,
                got: self.state_dim(),
            });
        }
        if self.horizon() > 0 && self.input_dim() != n_u {
            return Err(IdentError::DimensionMismatch {
                context: "trajectory input",
                expected: n_u,
                got: self.input_dim(),
            });
        }
        Ok(())
    }

    /// Regressor matrix with rows `[x_tᵀ u_tᵀ]`, `t = 0..T`.
    pub fn regressors(&self) -> DMatrix<f64> {
        let n_x = self.state_dim();
        let n_u = self.input_dim();
        DMatrix::from_fn(self.horizon(), n_x + n_u, |t, c| {
            if c < n_x {
                self.states[t][c]
            } else {
                self.inputs[t][c - n_x]
            }
        })
    }

    /// Target matrix with rows `x_{t+1}ᵀ`, `t = 0..T`.
    pub fn targets(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.horizon(), self.state_dim(), |t, c| self.states[t + 1][c])
    }
}
