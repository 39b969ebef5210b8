//! Finite-sample identifiability conditions
//!
//! Both checks compare the true system (candidate 0) against every alternative
//! through the weighted gaps
//!
//! - `β   = ‖Σ_w^{-1/2} ΔB Σ_u^{1/2}‖²_F`
//! - `γ_k = ‖Σ_w^{-1/2} ΔA A^k Σ_w^{1/2}‖²_F + ‖Σ_w^{-1/2} ΔA A^k B Σ_u^{1/2}‖²_F`
//!
//! with `ΔA = A_0 - A_i`, `ΔB = B_0 - B_i` and `A`, `B` the true matrices.
//!
//! The upper (sufficient) condition splits the horizon into blocks of length
//! `k_max = ⌊T / (320/3 · ln(2 n_x N / δ))⌋` and requires, per alternative,
//!
//! `n_x + √n_x ≤ 9/3200 · (k_max / T) · ⌊T / k_max⌋ · (n_x + β + Σ_{k < ⌊k_max/2⌋} γ_k)`.
//!
//! The lower (necessary) condition requires, per alternative,
//!
//! `T β + Σ_{s < T} (T - 1 - s) γ_s ≥ 2 ln(1 / (2.4 δ))`.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::linalg::{ensure_shape, spd_inv_sqrt, spd_sqrt};
use crate::system::{DiscreteSystem, LtiSystem};
use crate::IdentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Upper,
    Lower,
}

/// Reason a bound check is decided `false` without evaluating any candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Degeneracy {
    /// `delta` is not inside the open interval `(0, 1)`.
    DeltaOutOfRange(f64),
    /// The horizon is too short for a single block (`k_max = 0`).
    EmptyBlock,
}

/// Outcome of the condition for one alternative candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateMargin {
    pub index: usize,
    pub statistic: f64,
    pub threshold: f64,
}

impl CandidateMargin {
    pub fn satisfied(&self) -> bool {
        self.statistic >= self.threshold
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundReport {
    pub kind: BoundKind,
    pub delta: f64,
    pub horizon: usize,
    /// Block length (upper condition only).
    pub k_max: Option<usize>,
    pub degeneracy: Option<Degeneracy>,
    /// One entry per alternative, candidate 0 excluded.
    pub margins: Vec<CandidateMargin>,
}

impl BoundReport {
    pub fn holds(&self) -> bool {
        self.degeneracy.is_none() && self.margins.iter().all(CandidateMargin::satisfied)
    }

    fn degenerate(kind: BoundKind, delta: f64, horizon: usize, reason: Degeneracy) -> Self {
        Self {
            kind,
            delta,
            horizon,
            k_max: None,
            degeneracy: Some(reason),
            margins: Vec::new(),
        }
    }
}

/// Covariance square roots and the true system shared by every alternative.
struct GapWeights<'a> {
    truth: &'a LtiSystem,
    w_inv_sqrt: DMatrix<f64>,
    w_sqrt: DMatrix<f64>,
    u_sqrt: DMatrix<f64>,
    b_u_sqrt: DMatrix<f64>,
}

impl<'a> GapWeights<'a> {
    fn new(
        systems: &'a [LtiSystem],
        sigma_u: &DMatrix<f64>,
        sigma_w: &DMatrix<f64>,
    ) -> Result<Self, IdentError> {
        let truth = systems.first().ok_or(IdentError::EmptyCandidateSet)?;
        let (n_x, n_u) = (truth.state_dim(), truth.input_dim());
        for system in &systems[1..] {
            ensure_shape(system.a(), (n_x, n_x), "candidate A")?;
            ensure_shape(system.b(), (n_x, n_u), "candidate B")?;
        }
        ensure_shape(sigma_w, (n_x, n_x), "process noise covariance sigma_w")?;
        ensure_shape(sigma_u, (n_u, n_u), "excitation covariance sigma_u")?;

        let u_sqrt = spd_sqrt(sigma_u, "excitation covariance sigma_u")?;
        Ok(Self {
            truth,
            w_inv_sqrt: spd_inv_sqrt(sigma_w, "process noise covariance sigma_w")?,
            w_sqrt: spd_sqrt(sigma_w, "process noise covariance sigma_w")?,
            b_u_sqrt: truth.b() * &u_sqrt,
            u_sqrt,
        })
    }

    /// `β` for one alternative.
    fn input_gap(&self, alternative: &LtiSystem) -> f64 {
        let delta_b = self.truth.b() - alternative.b();
        (&self.w_inv_sqrt * delta_b * &self.u_sqrt).norm_squared()
    }

    /// `γ_0, …, γ_{count-1}` for one alternative.
    fn propagated_gaps(&self, alternative: &LtiSystem, count: usize) -> Vec<f64> {
        let a = self.truth.a();
        let mut left = &self.w_inv_sqrt * (a - alternative.a());
        let mut gaps = Vec::with_capacity(count);
        for _ in 0..count {
            let through_noise = (&left * &self.w_sqrt).norm_squared();
            let through_input = (&left * &self.b_u_sqrt).norm_squared();
            gaps.push(through_noise + through_input);
            left = &left * a;
        }
        gaps
    }
}

fn delta_in_range(delta: f64) -> bool {
    delta > 0.0 && delta < 1.0
}

/// Block length of the upper condition; `0` when the horizon is too short.
pub fn block_length(delta: f64, horizon: usize, n_x: usize, n_candidates: usize) -> usize {
    let denom = 320.0 / 3.0 * (2.0 * n_x as f64 * n_candidates as f64 / delta).ln();
    let k = (horizon as f64 / denom).floor();
    if k.is_finite() && k > 0.0 {
        k as usize
    } else {
        0
    }
}

pub fn upper_bound_report(
    delta: f64,
    horizon: usize,
    systems: &[LtiSystem],
    sigma_u: &DMatrix<f64>,
    sigma_w: &DMatrix<f64>,
) -> Result<BoundReport, IdentError> {
    let weights = GapWeights::new(systems, sigma_u, sigma_w)?;
    if !delta_in_range(delta) {
        warn!(delta, "upper bound check: delta outside (0, 1)");
        return Ok(BoundReport::degenerate(
            BoundKind::Upper,
            delta,
            horizon,
            Degeneracy::DeltaOutOfRange(delta),
        ));
    }

    let n_x = weights.truth.state_dim();
    let k_max = block_length(delta, horizon, n_x, systems.len());
    if k_max == 0 {
        debug!(horizon, delta, "upper bound check: horizon shorter than one block");
        return Ok(BoundReport::degenerate(
            BoundKind::Upper,
            delta,
            horizon,
            Degeneracy::EmptyBlock,
        ));
    }

    let n_x_f = n_x as f64;
    let threshold = n_x_f + n_x_f.sqrt();
    let scale = 9.0 / 3200.0 * k_max as f64 / horizon as f64 * (horizon / k_max) as f64;

    let margins = systems
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, alternative)| {
            let trace = n_x_f
                + weights.input_gap(alternative)
                + weights
                    .propagated_gaps(alternative, k_max / 2)
                    .iter()
                    .sum::<f64>();
            CandidateMargin {
                index,
                statistic: scale * trace,
                threshold,
            }
        })
        .collect();

    Ok(BoundReport {
        kind: BoundKind::Upper,
        delta,
        horizon,
        k_max: Some(k_max),
        degeneracy: None,
        margins,
    })
}

pub fn lower_bound_report(
    delta: f64,
    horizon: usize,
    systems: &[LtiSystem],
    sigma_u: &DMatrix<f64>,
    sigma_w: &DMatrix<f64>,
) -> Result<BoundReport, IdentError> {
    let weights = GapWeights::new(systems, sigma_u, sigma_w)?;
    if !delta_in_range(delta) {
        warn!(delta, "lower bound check: delta outside (0, 1)");
        return Ok(BoundReport::degenerate(
            BoundKind::Lower,
            delta,
            horizon,
            Degeneracy::DeltaOutOfRange(delta),
        ));
    }

    let threshold = 2.0 * (1.0 / (2.4 * delta)).ln();
    // The last step carries weight zero.
    let weighted_steps = horizon.saturating_sub(1);

    let margins = systems
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, alternative)| {
            let mut trace = horizon as f64 * weights.input_gap(alternative);
            for (s, gap) in weights
                .propagated_gaps(alternative, weighted_steps)
                .into_iter()
                .enumerate()
            {
                trace += (horizon - 1 - s) as f64 * gap;
            }
            CandidateMargin {
                index,
                statistic: trace,
                threshold,
            }
        })
        .collect();

    Ok(BoundReport {
        kind: BoundKind::Lower,
        delta,
        horizon,
        k_max: None,
        degeneracy: None,
        margins,
    })
}

/// `true` iff the sufficient sample-size condition holds for every alternative.
pub fn check_upper(
    delta: f64,
    horizon: usize,
    systems: &[LtiSystem],
    sigma_u: &DMatrix<f64>,
    sigma_w: &DMatrix<f64>,
) -> Result<bool, IdentError> {
    Ok(upper_bound_report(delta, horizon, systems, sigma_u, sigma_w)?.holds())
}

/// `true` iff the necessary sample-size condition holds for every alternative.
pub fn check_lower(
    delta: f64,
    horizon: usize,
    systems: &[LtiSystem],
    sigma_u: &DMatrix<f64>,
    sigma_w: &DMatrix<f64>,
) -> Result<bool, IdentError> {
    Ok(lower_bound_report(delta, horizon, systems, sigma_u, sigma_w)?.holds())
}
