//! Discrete-time linear time-invariant system model
//!
//! `x_{t+1} = A x_t + B u_t + w_t`

use nalgebra::{DMatrix, DVector};

use crate::linalg::{ensure_len, ensure_shape};
use crate::IdentError;

/// Capability shared by every simulable system in a candidate class.
pub trait DiscreteSystem {
    /// State dimension `n_x`
    fn state_dim(&self) -> usize;
    /// Input dimension `n_u`
    fn input_dim(&self) -> usize;
    /// Advance one step from state `x` under input `u` and process noise `w`.
    fn simulate_step(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        w: &DVector<f64>,
    ) -> Result<DVector<f64>, IdentError>;
}

/// Immutable LTI model. `B`'s shape defines `(n_x, n_u)`; `A` must be `n_x × n_x`.
#[derive(Debug, Clone, PartialEq)]
pub struct LtiSystem {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
}

impl LtiSystem {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<Self, IdentError> {
        let n_x = b.nrows();
        ensure_shape(&a, (n_x, n_x), "state transition matrix A")?;
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(IdentError::InvalidConfig(
                "system matrices must contain only finite values".to_string(),
            ));
        }
        Ok(Self { a, b })
    }

    /// Build a system from row-major slices.
    pub fn from_row_slices(
        n_x: usize,
        n_u: usize,
        a: &[f64],
        b: &[f64],
    ) -> Result<Self, IdentError> {
        if a.len() != n_x * n_x {
            return Err(IdentError::DimensionMismatch {
                context: "A entries",
                expected: n_x * n_x,
                got: a.len(),
            });
        }
        if b.len() != n_x * n_u {
            return Err(IdentError::DimensionMismatch {
                context: "B entries",
                expected: n_x * n_u,
                got: b.len(),
            });
        }
        Self::new(
            DMatrix::from_row_slice(n_x, n_x, a),
            DMatrix::from_row_slice(n_x, n_u, b),
        )
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    /// Stacked parameter matrix `[Aᵀ; Bᵀ]` of shape `(n_x + n_u) × n_x`.
    pub fn parameters(&self) -> DMatrix<f64> {
        let (n_x, n_u) = (self.state_dim(), self.input_dim());
        let mut theta = DMatrix::<f64>::zeros(n_x + n_u, n_x);
        theta.view_mut((0, 0), (n_x, n_x)).copy_from(&self.a.transpose());
        theta.view_mut((n_x, 0), (n_u, n_x)).copy_from(&self.b.transpose());
        theta
    }

    /// Noiseless rollout from `x0`; returns `inputs.len() + 1` states including `x0`.
    pub fn rollout(
        &self,
        x0: &DVector<f64>,
        inputs: &[DVector<f64>],
    ) -> Result<Vec<DVector<f64>>, IdentError> {
        let zero = DVector::<f64>::zeros(self.state_dim());
        let mut states = Vec::with_capacity(inputs.len() + 1);
        states.push(x0.clone());
        for u in inputs {
            let next = self.simulate_step(&states[states.len() - 1], u, &zero)?;
            states.push(next);
        }
        Ok(states)
    }
}

impl DiscreteSystem for LtiSystem {
    fn state_dim(&self) -> usize {
        self.b.nrows()
    }

    fn input_dim(&self) -> usize {
        self.b.ncols()
    }

    fn simulate_step(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        w: &DVector<f64>,
    ) -> Result<DVector<f64>, IdentError> {
        ensure_len(x, self.state_dim(), "state vector")?;
        ensure_len(u, self.input_dim(), "input vector")?;
        ensure_len(w, self.state_dim(), "noise vector")?;
        Ok(&self.a * x + &self.b * u + w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn reference_system() -> LtiSystem {
        LtiSystem::from_row_slices(
            3,
            2,
            &[0.2, 0.1, 0.0, 0.0, 0.2, 0.0, 0.0, 0.0, 0.5],
            &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn dimensions_come_from_b() {
        let sys = reference_system();
        assert_eq!(sys.state_dim(), 3);
        assert_eq!(sys.input_dim(), 2);
    }

    #[test]
    fn non_square_a_is_rejected() {
        let a = DMatrix::<f64>::zeros(3, 2);
        let b = DMatrix::<f64>::zeros(3, 1);
        assert!(matches!(
            LtiSystem::new(a, b),
            Err(IdentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn step_rejects_wrong_shapes() {
        let sys = reference_system();
        let x = DVector::zeros(3);
        let u = DVector::zeros(2);
        let w = DVector::zeros(3);

        assert!(sys.simulate_step(&DVector::zeros(2), &u, &w).is_err());
        assert!(matches!(
            sys.simulate_step(&x, &DVector::zeros(3), &w),
            Err(IdentError::DimensionMismatch {
                context: "input vector",
                expected: 2,
                got: 3
            })
        ));
        assert!(sys.simulate_step(&x, &u, &DVector::zeros(1)).is_err());
    }

    #[test]
    fn step_matches_state_equation() {
        let sys = reference_system();
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let u = DVector::from_vec(vec![-1.0, 0.5]);
        let w = DVector::from_vec(vec![0.01, 0.02, 0.03]);
        let next = sys.simulate_step(&x, &u, &w).unwrap();
        assert_relative_eq!(next[0], 0.2 + 0.2 + 0.01, epsilon = 1e-12);
        assert_relative_eq!(next[1], 0.4 - 1.0 + 0.02, epsilon = 1e-12);
        assert_relative_eq!(next[2], 1.5 + 0.5 + 0.03, epsilon = 1e-12);
    }

    #[test]
    fn zero_input_rollout_is_matrix_power() {
        let sys = reference_system();
        let x0 = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let inputs = vec![DVector::zeros(2); 6];
        let states = sys.rollout(&x0, &inputs).unwrap();
        assert_eq!(states.len(), 7);

        let mut power = DMatrix::<f64>::identity(3, 3);
        for state in &states {
            assert_relative_eq!(*state, &power * &x0, epsilon = 1e-12);
            power = &power * sys.a();
        }
    }

    #[test]
    fn parameters_stack_transposes() {
        let sys = reference_system();
        let theta = sys.parameters();
        assert_eq!(theta.shape(), (5, 3));
        assert_eq!(theta[(1, 0)], 0.1);
        assert_eq!(theta[(0, 1)], 0.0);
        assert_eq!(theta[(3, 1)], 1.0);
        assert_eq!(theta[(4, 2)], 1.0);
    }

    proptest! {
        #[test]
        fn zero_dynamics_pass_noise_through(
            x in prop::collection::vec(-100.0f64..100.0, 3),
            u in prop::collection::vec(-100.0f64..100.0, 2),
            w in prop::collection::vec(-1.0f64..1.0, 3),
        ) {
            let sys = LtiSystem::new(DMatrix::zeros(3, 3), DMatrix::zeros(3, 2)).unwrap();
            let w = DVector::from_vec(w);
            let next = sys
                .simulate_step(&DVector::from_vec(x), &DVector::from_vec(u), &w)
                .unwrap();
            prop_assert_eq!(next, w);
        }
    }
}
