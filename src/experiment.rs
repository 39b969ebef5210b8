//! Monte Carlo identification trials
//!
//! One trial simulates the true system (candidate 0) from the zero state for
//! `T` steps under Gaussian process noise and Gaussian excitation, then hands
//! the trajectory to a fresh ERM and a fresh OLS estimator. A batch runs `R`
//! such trials on a [`TrialPool`], each on its own ChaCha stream.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::estimator::{EstimatorKind, ESTIMATOR_ORDER};
use crate::linalg::ensure_shape;
use crate::noise::GaussianNoise;
use crate::pool::TrialPool;
use crate::system::{DiscreteSystem, LtiSystem};
use crate::trajectory::Trajectory;
use crate::IdentError;

/// Validated, read-only configuration shared by every trial of a batch.
#[derive(Debug, Clone)]
pub struct ExperimentSetup {
    systems: Vec<LtiSystem>,
    horizon: usize,
    process_noise: GaussianNoise,
    excitation: GaussianNoise,
}

impl ExperimentSetup {
    /// `systems[0]` is the true system. All candidates must share `(n_x, n_u)`
    /// and both covariances must be symmetric positive definite.
    pub fn new(
        systems: Vec<LtiSystem>,
        horizon: usize,
        sigma_w: DMatrix<f64>,
        sigma_u: DMatrix<f64>,
    ) -> Result<Self, IdentError> {
        let truth = systems.first().ok_or(IdentError::EmptyCandidateSet)?;
        let (n_x, n_u) = (truth.state_dim(), truth.input_dim());
        for system in &systems[1..] {
            ensure_shape(system.b(), (n_x, n_u), "candidate B")?;
        }
        if horizon == 0 {
            return Err(IdentError::InvalidConfig(
                "horizon must be > 0".to_string(),
            ));
        }
        ensure_shape(&sigma_w, (n_x, n_x), "process noise covariance sigma_w")?;
        ensure_shape(&sigma_u, (n_u, n_u), "excitation covariance sigma_u")?;

        Ok(Self {
            process_noise: GaussianNoise::new(sigma_w, "process noise covariance sigma_w")?,
            excitation: GaussianNoise::new(sigma_u, "excitation covariance sigma_u")?,
            systems,
            horizon,
        })
    }

    pub fn systems(&self) -> &[LtiSystem] {
        &self.systems
    }

    pub fn truth(&self) -> &LtiSystem {
        &self.systems[0]
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn sigma_w(&self) -> &DMatrix<f64> {
        self.process_noise.covariance()
    }

    pub fn sigma_u(&self) -> &DMatrix<f64> {
        self.excitation.covariance()
    }

    pub fn process_noise(&self) -> &GaussianNoise {
        &self.process_noise
    }

    pub fn excitation(&self) -> &GaussianNoise {
        &self.excitation
    }
}

/// Simulate `system` for `horizon` steps from the zero state.
///
/// At every step `w_t` is drawn before `u_t`, both from `rng`.
pub fn generate_trajectory<R: Rng + ?Sized>(
    system: &LtiSystem,
    horizon: usize,
    process_noise: &GaussianNoise,
    excitation: &GaussianNoise,
    rng: &mut R,
) -> Result<Trajectory, IdentError> {
    let (n_x, n_u) = (system.state_dim(), system.input_dim());
    if process_noise.dim() != n_x {
        return Err(IdentError::DimensionMismatch {
            context: "process noise dimension",
            expected: n_x,
            got: process_noise.dim(),
        });
    }
    if excitation.dim() != n_u {
        return Err(IdentError::DimensionMismatch {
            context: "excitation dimension",
            expected: n_u,
            got: excitation.dim(),
        });
    }

    let mut states = Vec::with_capacity(horizon + 1);
    let mut inputs = Vec::with_capacity(horizon);
    let mut x = DVector::<f64>::zeros(n_x);
    states.push(x.clone());
    for _ in 0..horizon {
        let w = process_noise.sample(rng);
        let u = excitation.sample(rng);
        x = system.simulate_step(&x, &u, &w)?;
        inputs.push(u);
        states.push(x.clone());
    }
    Trajectory::new(states, inputs)
}

/// Candidate indices selected in one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimationOutcome {
    pub erm: usize,
    pub ols: usize,
}

impl EstimationOutcome {
    pub fn selected(&self, kind: EstimatorKind) -> usize {
        match kind {
            EstimatorKind::Erm => self.erm,
            EstimatorKind::Ols => self.ols,
        }
    }

    /// `[ERM index, OLS index]`
    pub fn as_pair(&self) -> [usize; 2] {
        [self.erm, self.ols]
    }
}

/// Run one trial: simulate the true system, then fit both estimators.
pub fn run_experiment<R: Rng + ?Sized>(
    setup: &ExperimentSetup,
    rng: &mut R,
) -> Result<EstimationOutcome, IdentError> {
    let trajectory = generate_trajectory(
        setup.truth(),
        setup.horizon,
        &setup.process_noise,
        &setup.excitation,
        rng,
    )?;

    let mut outcome = EstimationOutcome { erm: 0, ols: 0 };
    for kind in ESTIMATOR_ORDER {
        let mut estimator = kind.build(&setup.systems, setup.sigma_w())?;
        let selection = estimator.fit(&trajectory)?;
        match kind {
            EstimatorKind::Erm => outcome.erm = selection.index,
            EstimatorKind::Ols => outcome.ols = selection.index,
        }
    }
    Ok(outcome)
}

/// Per-trial generator: stream `trial` of the ChaCha generator keyed by `seed`.
pub fn trial_rng(seed: u64, trial: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(trial as u64);
    rng
}

/// Outcomes of a batch, one slot per trial in trial order.
#[derive(Debug)]
pub struct BatchResult {
    pub seed: u64,
    pub outcomes: Vec<Result<EstimationOutcome, IdentError>>,
}

impl BatchResult {
    pub fn runs(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    /// `R × 2` selection matrix; `None` marks a failed trial.
    pub fn selections(&self) -> Vec<Option<[usize; 2]>> {
        self.outcomes
            .iter()
            .map(|o| o.as_ref().ok().map(EstimationOutcome::as_pair))
            .collect()
    }
}

/// Run `runs` independent trials of `setup` on `pool`.
///
/// Trial `i` draws from [`trial_rng(seed, i)`](trial_rng), so the batch is
/// reproducible and independent of the pool's thread count. A failing trial
/// only fails its own slot.
pub fn run_experiments(
    setup: &ExperimentSetup,
    runs: usize,
    seed: u64,
    pool: &TrialPool,
) -> BatchResult {
    debug!(
        runs,
        seed,
        horizon = setup.horizon,
        threads = pool.threads(),
        "running trial batch"
    );
    let outcomes = pool.run(runs, |trial| {
        let mut rng = trial_rng(seed, trial);
        run_experiment(setup, &mut rng)
    });

    let batch = BatchResult { seed, outcomes };
    let failed = batch.failures();
    if let Some((trial, Err(err))) = batch.outcomes.iter().enumerate().find(|(_, o)| o.is_err()) {
        warn!(
            failed,
            runs,
            horizon = setup.horizon,
            first_trial = trial,
            %err,
            "trials failed"
        );
    }
    batch
}

/// Fraction of trials in which each estimator picked each candidate.
///
/// Frequencies are `count / R` with `R` the total number of trials, failed
/// trials included, so each row sums to `1 - failed / R`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionFrequencies {
    pub runs: usize,
    pub failed: usize,
    pub erm: Vec<f64>,
    pub ols: Vec<f64>,
}

impl SelectionFrequencies {
    pub fn from_batch(batch: &BatchResult, n_candidates: usize) -> Self {
        let mut erm = vec![0usize; n_candidates];
        let mut ols = vec![0usize; n_candidates];
        let mut failed = 0;
        for outcome in &batch.outcomes {
            match outcome {
                Ok(o) if o.erm < n_candidates && o.ols < n_candidates => {
                    erm[o.erm] += 1;
                    ols[o.ols] += 1;
                }
                _ => failed += 1,
            }
        }

        let runs = batch.runs();
        let to_freq = |counts: Vec<usize>| -> Vec<f64> {
            counts
                .into_iter()
                .map(|c| if runs == 0 { 0.0 } else { c as f64 / runs as f64 })
                .collect()
        };
        Self {
            runs,
            failed,
            erm: to_freq(erm),
            ols: to_freq(ols),
        }
    }

    pub fn for_kind(&self, kind: EstimatorKind) -> &[f64] {
        match kind {
            EstimatorKind::Erm => &self.erm,
            EstimatorKind::Ols => &self.ols,
        }
    }

    /// Index with the highest frequency; ties keep the lowest index.
    pub fn plurality(&self, kind: EstimatorKind) -> Option<usize> {
        let freqs = self.for_kind(kind);
        let mut best: Option<usize> = None;
        for (i, &f) in freqs.iter().enumerate() {
            if best.map_or(true, |b| f > freqs[b]) {
                best = Some(i);
            }
        }
        best
    }
}
