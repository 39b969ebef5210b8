use lti_sysid::{
    check_lower, check_upper, run_experiments, run_sweep, EstimatorKind, ExperimentPlan,
    SelectionFrequencies, TrialPool,
};

fn reference_frequencies(horizon: usize, runs: usize) -> SelectionFrequencies {
    let plan = ExperimentPlan::preset(1).unwrap();
    let setup = plan.setup(horizon).unwrap();
    let pool = TrialPool::new(None).unwrap();
    let batch = run_experiments(&setup, runs, plan.seed, &pool);
    assert_eq!(batch.runs(), runs);
    assert_eq!(batch.failures(), 0);
    for pair in batch.selections().into_iter().flatten() {
        assert!(pair.iter().all(|&i| i < 3));
    }
    SelectionFrequencies::from_batch(&batch, 3)
}

#[test]
fn erm_favours_true_system_at_short_horizon() {
    let freq = reference_frequencies(20, 1000);
    assert_eq!(freq.plurality(EstimatorKind::Erm), Some(0));
    assert!(freq.erm[0] > 1.0 / 3.0, "erm[0] = {}", freq.erm[0]);
    let total: f64 = freq.ols.iter().sum();
    assert!((total - 1.0).abs() < 1e-12);
}

#[test]
fn erm_majority_at_long_horizon() {
    let freq = reference_frequencies(200, 1000);
    assert!(freq.erm[0] > 0.5, "erm[0] = {}", freq.erm[0]);
    assert_eq!(freq.plurality(EstimatorKind::Erm), Some(0));
}

#[test]
fn bound_checks_on_reference_experiment() {
    let plan = ExperimentPlan::preset(1).unwrap();
    let systems = plan.candidate_systems().unwrap();
    let sigma_w = plan.sigma_w_matrix().unwrap();
    let sigma_u = plan.sigma_u_matrix().unwrap();

    assert!(!check_lower(plan.delta, 20, &systems, &sigma_u, &sigma_w).unwrap());
    assert!(check_lower(plan.delta, 1000, &systems, &sigma_u, &sigma_w).unwrap());
    assert!(!check_upper(plan.delta, 20, &systems, &sigma_u, &sigma_w).unwrap());
    assert!(!check_upper(plan.delta, 1000, &systems, &sigma_u, &sigma_w).unwrap());

    for delta in [0.0, 1.0] {
        assert!(!check_lower(delta, 1000, &systems, &sigma_u, &sigma_w).unwrap());
        assert!(!check_upper(delta, 1000, &systems, &sigma_u, &sigma_w).unwrap());
    }
}

#[test]
fn sweep_matches_direct_batches() {
    let mut plan = ExperimentPlan::preset(2).unwrap();
    plan.runs = 50;
    let pool = TrialPool::new(Some(2)).unwrap();
    let rows = run_sweep(&plan, &pool).unwrap();

    for (index, row) in rows.iter().enumerate() {
        let setup = plan.setup(row.horizon).unwrap();
        let batch = run_experiments(&setup, plan.runs, plan.horizon_seed(index), &pool);
        let freq = SelectionFrequencies::from_batch(&batch, 3);
        assert_eq!(row.erm, freq.erm);
        assert_eq!(row.ols, freq.ols);
    }
}
