// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Report results as a table, TSV or JSON, and save or reload them.
//!
//! A saved run is a directory holding `config.json` (how the run was
//! configured) and `results.jsonl` (one [`InstanceResult`] per line).

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smtlib::conf::SolverCmd;
use tabled::settings::{
    object::{Columns, Object, Rows},
    Alignment, Modify, Style,
};

use crate::{
    dataset::Split,
    error::EvalError,
    run::Evaluation,
    stratify::{InstanceResult, Stratification},
    verifier::SolverType,
};

/// The configuration of a run, saved next to its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory of the benchmark
    pub path_to_data: PathBuf,
    /// Evaluation split
    pub split: Split,
    /// Seed of the subset sampler
    pub seed: u64,
    /// Subsets sampled per instance
    pub attempts: usize,
    /// Solver used for checking
    pub solver: SolverType,
    /// Per-check timeout in milliseconds
    pub timeout_ms: usize,
    /// Whether the ground-truth cores were minimized
    pub minimize_cores: bool,
    /// Indices of instances the solver could not show unsat
    #[serde(default)]
    pub skipped: Vec<usize>,
    /// How the solver was launched
    #[serde(default)]
    pub solver_cmd: Option<SolverCmd>,
}

/// Write the configuration and results of a run to `dir`.
pub fn save_results(
    dir: &Path,
    config: &RunConfig,
    results: &[InstanceResult],
) -> Result<(), EvalError> {
    fs::create_dir_all(dir).map_err(EvalError::io(dir))?;

    let config_path = dir.join("config.json");
    let mut f = File::create(&config_path).map_err(EvalError::io(&config_path))?;
    serde_json::to_writer_pretty(&mut f, config).map_err(EvalError::json(&config_path))?;
    writeln!(&mut f).map_err(EvalError::io(&config_path))?;

    let results_path = dir.join("results.jsonl");
    let mut f = File::create(&results_path).map_err(EvalError::io(&results_path))?;
    for r in results {
        serde_json::to_writer(&mut f, r).map_err(EvalError::json(&results_path))?;
        writeln!(&mut f).map_err(EvalError::io(&results_path))?;
    }
    log::info!("saved {} results to {}", results.len(), dir.display());
    Ok(())
}

/// Load a run saved by [`save_results`].
pub fn load_results(dir: &Path) -> Result<(RunConfig, Vec<InstanceResult>), EvalError> {
    let config_path = dir.join("config.json");
    let f = File::open(&config_path).map_err(EvalError::io(&config_path))?;
    let config: RunConfig =
        serde_json::from_reader(BufReader::new(f)).map_err(EvalError::json(&config_path))?;

    let results_path = dir.join("results.jsonl");
    let f = File::open(&results_path).map_err(EvalError::io(&results_path))?;
    let mut results = vec![];
    for line in BufReader::new(f).lines() {
        let line = line.map_err(EvalError::io(&results_path))?;
        if line.trim().is_empty() {
            continue;
        }
        results.push(serde_json::from_str(&line).map_err(EvalError::json(&results_path))?);
    }
    Ok((config, results))
}

/// One row of the stratified table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRow {
    /// Interval label, or "Total"
    pub interval: String,
    /// Instances where an unsat subset was found
    pub correct: usize,
    /// Instances in the interval
    pub total: usize,
    /// Ratio per successful instance
    pub adjusted: f64,
    /// Ratio per instance
    pub absolute: f64,
}

/// Everything that gets reported about a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Mean fraction of constraints removed, failures counting as 0
    pub mean_reduction: Option<f64>,
    /// Mean fraction of constraints removed over successes
    pub mean_reduction_corrected: Option<f64>,
    /// Number of instances without ground truth
    pub skipped: usize,
    /// Stratified rows, intervals first and the total last
    pub buckets: Vec<BucketRow>,
}

fn percent(x: Option<f64>) -> String {
    match x {
        Some(x) => format!("{:.2}%", x * 100.0),
        None => "n/a".to_string(),
    }
}

impl Summary {
    /// Summarize per-instance results.
    pub fn new(results: &[InstanceResult], skipped: usize) -> Self {
        let strat = Stratification::from_results(results);
        let buckets = strat
            .buckets()
            .map(|(bucket, stats)| BucketRow {
                interval: bucket.to_string(),
                correct: stats.correct,
                total: stats.total,
                adjusted: stats.adjusted(),
                absolute: stats.absolute(),
            })
            .collect();
        Self {
            mean_reduction: strat.mean_reduction(),
            mean_reduction_corrected: strat.mean_reduction_corrected(),
            skipped,
            buckets,
        }
    }

    /// Summarize a finished evaluation.
    pub fn of_evaluation(evaluation: &Evaluation) -> Self {
        Self::new(&evaluation.results, evaluation.skipped.len())
    }

    /// Header used for the table. Make sure this stays in sync with [`Self::rows`].
    fn header() -> Vec<String> {
        ["interval", "C/N", "adjusted r", "absolute r"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.buckets
            .iter()
            .map(|row| {
                vec![
                    row.interval.clone(),
                    format!("{}/{}", row.correct, row.total),
                    format!("{:.3}", row.adjusted),
                    format!("{:.3}", row.absolute),
                ]
            })
            .collect()
    }

    /// The two headline numbers.
    pub fn headline(&self) -> String {
        let mut s = format!(
            "Mean constraint reduction: {}\nMean constraint reduction, corrected: {}",
            percent(self.mean_reduction),
            percent(self.mean_reduction_corrected)
        );
        if self.skipped > 0 {
            s.push_str(&format!("\nSkipped (not unsat): {}", self.skipped));
        }
        s
    }

    /// Render the stratified results as a table.
    pub fn table(&self) -> String {
        let mut rows = vec![Self::header()];
        rows.extend(self.rows());
        let mut table = tabled::builder::Builder::from(rows).build();
        table
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..).not(Rows::first())).with(Alignment::right()));
        table.to_string()
    }

    /// Print the headline numbers and the table.
    pub fn print(&self) {
        println!("{}", self.headline());
        println!("Stratification based on intervals of total constraints:");
        println!("{}", self.table());
    }

    /// The stratified results as tab-separated values, with a header line.
    pub fn as_tsv(&self) -> String {
        let mut lines = vec![Self::header().join("\t")];
        lines.extend(self.rows().into_iter().map(|row| row.join("\t")));
        lines.into_iter().map(|l| l + "\n").join("")
    }

    /// The summary as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("could not serialize `Summary`")
    }
}
