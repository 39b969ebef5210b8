use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;

use crate::config::ExperimentPlan;
use crate::sweep::HorizonRow;
use crate::IdentError;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub schema_version: String,
    pub created: String,
    pub threads: usize,
    pub results_file: String,
    pub plan: ExperimentPlan,
    pub rows: Vec<HorizonRow>,
}

/// Floats keep a trailing `.0` so booleans read back as `1.0` / `0.0`.
fn fmt_f64(v: f64) -> String {
    format!("{v:?}")
}

fn fmt_flag(v: bool) -> String {
    fmt_f64(if v { 1.0 } else { 0.0 })
}

pub fn ensure_outdir(outdir: &Path) -> Result<(), IdentError> {
    fs::create_dir_all(outdir)?;
    Ok(())
}

/// `<name>_<YYYY-MM-DD>_delta_<⌊100 δ⌋>.csv`
pub fn results_file_name(plan: &ExperimentPlan, date: NaiveDate) -> String {
    format!(
        "{}_{}_delta_{}.csv",
        plan.name,
        date.format("%Y-%m-%d"),
        (100.0 * plan.delta).floor() as i64
    )
}

pub fn results_header(n_candidates: usize) -> Vec<String> {
    let mut header = vec!["T".to_string()];
    for kind in ["ERM", "OLS"] {
        header.extend((0..n_candidates).map(|i| format!("Sys{i}_per_{kind}")));
    }
    header.extend(
        ["theoCondLower", "theoCondUpper", "failedTrials"]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

/// Semicolon-separated table, one line per horizon.
pub fn write_results_csv(
    path: &Path,
    rows: &[HorizonRow],
    n_candidates: usize,
) -> Result<(), IdentError> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path)?;

    wtr.write_record(results_header(n_candidates))?;
    for row in rows {
        for (context, freqs) in [("ERM frequency row", &row.erm), ("OLS frequency row", &row.ols)] {
            if freqs.len() != n_candidates {
                return Err(IdentError::DimensionMismatch {
                    context,
                    expected: n_candidates,
                    got: freqs.len(),
                });
            }
        }

        let mut record = Vec::with_capacity(2 * n_candidates + 4);
        record.push(row.horizon.to_string());
        record.extend(row.erm.iter().copied().map(fmt_f64));
        record.extend(row.ols.iter().copied().map(fmt_f64));
        record.push(fmt_flag(row.lower_holds));
        record.push(fmt_flag(row.upper_holds));
        record.push(row.failed.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), IdentError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
