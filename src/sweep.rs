//! Horizon sweep: for every horizon of a plan, evaluate both sample-size
//! conditions and run one Monte Carlo batch.

use serde::Serialize;
use tracing::info;

use crate::bounds::{lower_bound_report, upper_bound_report};
use crate::config::ExperimentPlan;
use crate::estimator::EstimatorKind;
use crate::experiment::{run_experiments, SelectionFrequencies};
use crate::pool::TrialPool;
use crate::IdentError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonRow {
    pub horizon: usize,
    pub erm: Vec<f64>,
    pub ols: Vec<f64>,
    pub lower_holds: bool,
    pub upper_holds: bool,
    pub failed: usize,
}

pub fn run_sweep(plan: &ExperimentPlan, pool: &TrialPool) -> Result<Vec<HorizonRow>, IdentError> {
    plan.validate()?;
    let mut rows = Vec::with_capacity(plan.horizons.len());

    for (index, &horizon) in plan.horizons.iter().enumerate() {
        let setup = plan.setup(horizon)?;
        let upper = upper_bound_report(
            plan.delta,
            horizon,
            setup.systems(),
            setup.sigma_u(),
            setup.sigma_w(),
        )?;
        let lower = lower_bound_report(
            plan.delta,
            horizon,
            setup.systems(),
            setup.sigma_u(),
            setup.sigma_w(),
        )?;

        let batch = run_experiments(&setup, plan.runs, plan.horizon_seed(index), pool);
        let freq = SelectionFrequencies::from_batch(&batch, setup.systems().len());

        info!(
            horizon,
            erm_true = freq.erm[0],
            ols_true = freq.ols[0],
            erm_plurality = ?freq.plurality(EstimatorKind::Erm),
            ols_plurality = ?freq.plurality(EstimatorKind::Ols),
            lower = lower.holds(),
            upper = upper.holds(),
            failed = freq.failed,
            "horizon complete"
        );

        rows.push(HorizonRow {
            horizon,
            lower_holds: lower.holds(),
            upper_holds: upper.holds(),
            failed: freq.failed,
            erm: freq.erm,
            ols: freq.ols,
        });
    }
    Ok(rows)
}
