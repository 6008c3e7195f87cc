// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The naive-baseline binary's command-line interface.

use std::{fs, path::PathBuf, time::Duration};

use clap::Args;
use smtlib::{path::solver_path, proc::SatResp};

use crate::{
    dataset::{self, Split},
    error::EvalError,
    formula::{select_by_text, Naming, Template, DEFAULT_LOGIC},
    report::{load_results, save_results, RunConfig, Summary},
    run::{evaluate, EvalConfig},
    sampling::{SubsetSampler, DEFAULT_SEED},
    verifier::{SolverType, UnsatOracle, UnsatVerifier},
};

#[derive(Args, Clone, Debug, PartialEq, Eq)]
struct SolverArgs {
    // solver arguments are global, meaning they are allowed even after
    // subcommands
    #[arg(value_enum, long, default_value_t = SolverType::Cvc5, global = true)]
    /// Solver to use
    solver: SolverType,

    #[arg(long, default_value = "600s", global = true)]
    /// Time limit for each solver check (0s disables it)
    timeout: humantime::Duration,

    #[arg(long, global = true)]
    /// SMT solver random seed
    solver_seed: Option<usize>,

    #[arg(long, global = true)]
    /// Use the solver's unsat cores as they are, without asking for minimal
    /// ones
    no_minimize_cores: bool,

    #[arg(long, default_value = DEFAULT_LOGIC, global = true)]
    /// Logic used when a formula template does not set one
    default_logic: String,

    #[arg(long, global = true)]
    /// Directory to save every solver query to
    smt_log: Option<PathBuf>,

    #[arg(long, global = true)]
    /// Log solver statistics after each unsat check
    solver_stats: bool,
}

impl SolverArgs {
    fn timeout_ms(&self) -> usize {
        let ms = Duration::from(self.timeout).as_millis();
        usize::try_from(ms).unwrap_or(usize::MAX)
    }

    fn minimize_cores(&self) -> bool {
        !self.no_minimize_cores
    }

    fn verifier(&self) -> UnsatVerifier {
        let timeout_ms = match self.timeout_ms() {
            0 => None,
            ms => Some(ms),
        };
        if self.solver == SolverType::Cvc4 && self.minimize_cores() {
            log::warn!("cvc4 cannot minimize unsat cores, ground truth may not be minimal");
        }
        let mut verifier = UnsatVerifier::new(self.solver, &solver_path(self.solver.bin_name()));
        verifier
            .timeout_ms(timeout_ms)
            .seed(self.solver_seed)
            .minimize_cores(self.minimize_cores())
            .tee(self.smt_log.clone())
            .statistics(self.solver_stats);
        verifier
    }
}

#[derive(Args, Clone, Debug, PartialEq, Eq)]
struct RunArgs {
    #[command(flatten)]
    solver: SolverArgs,

    /// Directory containing the benchmark JSON files
    #[arg(long, alias = "path_to_data", default_value = "../dataset")]
    path_to_data: PathBuf,

    /// Benchmark split to evaluate
    #[arg(value_enum, long, default_value_t = Split::Test)]
    split: Split,

    /// Seed for sampling subsets
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Subsets sampled per instance before giving up
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    n: u32,

    /// Only evaluate the first K instances
    #[arg(long, value_name = "K")]
    limit: Option<usize>,

    /// Directory to save the configuration and per-instance results to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// File to output the stratified table in TSV format to
    #[arg(long)]
    tsv: Option<PathBuf>,

    /// Output the summary in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Args, Clone, Debug, PartialEq, Eq)]
struct CheckArgs {
    #[command(flatten)]
    solver: SolverArgs,

    /// Directory containing the benchmark JSON files
    #[arg(long, alias = "path_to_data", default_value = "../dataset")]
    path_to_data: PathBuf,

    /// Benchmark split the instance is taken from
    #[arg(value_enum, long, default_value_t = Split::Test)]
    split: Split,

    /// Position of the instance in the benchmark
    #[arg(long)]
    instance: usize,

    /// A constraint of the candidate subset, exactly as written in the
    /// instance (repeat for each constraint)
    #[arg(long = "constraint", value_name = "TEXT")]
    constraints: Vec<String>,
}

#[derive(clap::Subcommand, Clone, Debug, PartialEq, Eq)]
enum Command {
    /// Sample random subsets of every instance and report how much they
    /// reduce the formula, stratified by instance size.
    Run(RunArgs),
    /// Report on results saved by `run --output-dir`.
    Report {
        /// Directory the results were saved to
        #[arg(long)]
        dir: PathBuf,
        /// File to output the stratified table in TSV format to
        #[arg(long)]
        tsv: Option<PathBuf>,
        /// Output the summary in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Check whether a subset of an instance's constraints is unsatisfiable.
    Check(CheckArgs),
}

#[derive(clap::Parser, Debug)]
#[command(about, long_about=None)]
/// Entrypoint for the naive-baseline binary, including all commands.
pub struct App {
    #[command(subcommand)]
    /// Command to run
    command: Command,
}

fn output(summary: &Summary, tsv: &Option<PathBuf>, json: bool) -> Result<(), EvalError> {
    if json {
        println!("{}", summary.to_json());
    } else {
        summary.print();
    }
    if let Some(fname) = tsv {
        fs::write(fname, summary.as_tsv()).map_err(EvalError::io(fname))?;
    }
    Ok(())
}

impl RunArgs {
    fn exec(&self) -> Result<(), EvalError> {
        log::info!(
            "running the naive baseline on the {} split of {} ({:?}, {} attempts, seed {})",
            self.split,
            self.path_to_data.display(),
            self.solver.solver,
            self.n,
            self.seed,
        );
        let mut instances = dataset::load(&self.path_to_data, self.split)?;
        if let Some(limit) = self.limit {
            instances.truncate(limit);
        }
        let verifier = self.solver.verifier();
        let mut sampler = SubsetSampler::new(self.seed);
        let config = EvalConfig {
            attempts: self.n as usize,
            default_logic: self.solver.default_logic.clone(),
            progress: true,
        };
        let evaluation = evaluate(&instances, &verifier, &mut sampler, &config)?;

        if let Some(dir) = &self.output_dir {
            let run_config = RunConfig {
                path_to_data: self.path_to_data.clone(),
                split: self.split,
                seed: self.seed,
                attempts: self.n as usize,
                solver: self.solver.solver,
                timeout_ms: self.solver.timeout_ms(),
                minimize_cores: self.solver.minimize_cores(),
                solver_cmd: Some(verifier.solver_cmd()),
                skipped: evaluation.skipped.clone(),
            };
            save_results(dir, &run_config, &evaluation.results)?;
        }
        output(&Summary::of_evaluation(&evaluation), &self.tsv, self.json)
    }
}

impl CheckArgs {
    fn exec(&self) -> Result<(), EvalError> {
        let instances = dataset::load(&self.path_to_data, self.split)?;
        let instance = instances
            .get(self.instance)
            .ok_or(EvalError::NoSuchInstance {
                index: self.instance,
                len: instances.len(),
            })?;
        let selection = select_by_text(self.instance, instance, &self.constraints)?;
        let template = Template::new(self.instance, instance, &self.solver.default_logic)?;
        let verdict = self
            .solver
            .verifier()
            .check(&template.formula(&selection, Naming::Anonymous)?)?;
        match &verdict.resp {
            SatResp::Sat => println!("sat"),
            SatResp::Unsat => println!("unsat"),
            SatResp::Unknown(reason) => println!("unknown ({reason})"),
        }
        if let Some(stats) = &verdict.statistics {
            for (name, value) in stats {
                println!("  {name}: {value}");
            }
        }
        Ok(())
    }
}

impl App {
    /// Run the application.
    pub fn exec(self) -> Result<(), EvalError> {
        match &self.command {
            Command::Run(args) => args.exec(),
            Command::Report { dir, tsv, json } => {
                let (config, results) = load_results(dir)?;
                log::info!(
                    "loaded {} results ({} split, {:?}, {} attempts, seed {})",
                    results.len(),
                    config.split,
                    config.solver,
                    config.attempts,
                    config.seed,
                );
                output(&Summary::new(&results, config.skipped.len()), tsv, *json)
            }
            Command::Check(args) => args.exec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{App, Command};
    use crate::{dataset::Split, verifier::SolverType};
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn test_run_defaults() {
        let app = App::try_parse_from(["naive-baseline", "run"]).unwrap();
        let Command::Run(args) = app.command else {
            panic!("expected run command");
        };
        assert_eq!(args.path_to_data.to_str(), Some("../dataset"));
        assert_eq!(args.split, Split::Test);
        assert_eq!(args.seed, 42);
        assert_eq!(args.n, 5);
        assert_eq!(args.solver.solver, SolverType::Cvc5);
        assert_eq!(args.solver.timeout_ms(), 600_000);
        assert_eq!(args.solver.default_logic, "QF_SLIA");

        let minimal = ("minimal-unsat-cores".to_string(), "true".to_string());
        assert!(args.solver.minimize_cores());
        assert!(args.solver.verifier().solver_cmd().options.contains(&minimal));

        let app =
            App::try_parse_from(["naive-baseline", "run", "--no-minimize-cores"]).unwrap();
        let Command::Run(args) = app.command else {
            panic!("expected run command");
        };
        assert!(!args.solver.verifier().solver_cmd().options.contains(&minimal));
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let app = App::try_parse_from(["naive-baseline", "run"]).unwrap();
        let Command::Run(mut args) = app.command else {
            panic!("expected run command");
        };
        args.solver.timeout = Duration::MAX.into();
        assert_eq!(args.solver.timeout_ms(), usize::MAX);
    }

    #[test]
    fn test_run_args() {
        let app = App::try_parse_from([
            "naive-baseline",
            "run",
            "--path_to_data",
            "data",
            "--split",
            "val",
            "--n",
            "10",
            "--solver",
            "z3",
            "--timeout",
            "2s",
        ])
        .unwrap();
        let Command::Run(args) = app.command else {
            panic!("expected run command");
        };
        assert_eq!(args.path_to_data.to_str(), Some("data"));
        assert_eq!(args.split, Split::Val);
        assert_eq!(args.n, 10);
        assert_eq!(args.solver.solver, SolverType::Z3);
        assert_eq!(args.solver.timeout_ms(), 2000);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(App::try_parse_from(["naive-baseline", "run", "--n", "0"]).is_err());
    }

    #[test]
    fn test_check_args() {
        let app = App::try_parse_from([
            "naive-baseline",
            "check",
            "--instance",
            "3",
            "--constraint",
            "x > 1",
            "--constraint",
            "x < 0",
        ])
        .unwrap();
        let Command::Check(args) = app.command else {
            panic!("expected check command");
        };
        assert_eq!(args.instance, 3);
        assert_eq!(args.constraints, vec!["x > 1", "x < 0"]);
    }

    #[test]
    fn test_report_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::try_parse_from([
            "naive-baseline",
            "report",
            "--dir",
            dir.path().join("nothing").to_str().unwrap(),
        ])
        .unwrap();
        assert!(app.exec().is_err());
    }
}
