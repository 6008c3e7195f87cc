// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Run the naive baseline over a list of benchmark instances.

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    dataset::Instance,
    error::EvalError,
    formula::{Naming, Template},
    sampling::SubsetSampler,
    stratify::InstanceResult,
    verifier::UnsatOracle,
};

/// Results of a run. Instances whose full formula the solver could not show
/// unsatisfiable have no ground truth and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// One result per evaluated instance, in benchmark order
    pub results: Vec<InstanceResult>,
    /// Indices of skipped instances
    pub skipped: Vec<usize>,
}

/// Settings of the evaluation loop.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Subsets sampled per instance before giving up
    pub attempts: usize,
    /// Logic set when an instance's template has none
    pub default_logic: String,
    /// Show a progress bar on stderr
    pub progress: bool,
}

fn progress_bar(len: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} [ETA: {eta_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Evaluate one instance: compute the ground-truth core, then sample subsets.
///
/// Returns `None` if the instance is not unsatisfiable according to the
/// solver.
pub fn evaluate_instance<O: UnsatOracle>(
    index: usize,
    instance: &Instance,
    oracle: &O,
    sampler: &mut SubsetSampler,
    config: &EvalConfig,
) -> Result<Option<InstanceResult>, EvalError> {
    let template = Template::new(index, instance, &config.default_logic)?;
    let Some(core) = oracle.unsat_core(&template.formula(&template.all(), Naming::Tracked)?)?
    else {
        return Ok(None);
    };
    let outcome = sampler.search(template.len(), config.attempts, |subset| {
        let verdict = oracle.check(&template.formula(subset, Naming::Anonymous)?)?;
        if let Some(stats) = &verdict.statistics {
            for (name, value) in stats {
                log::debug!("    {name}: {value}");
            }
        }
        Ok::<_, EvalError>(verdict.is_unsat())
    })?;
    Ok(Some(InstanceResult {
        index,
        num_constraints: template.len(),
        core_size: core.len(),
        subset_size: outcome.subset.len(),
        attempts: outcome.attempts,
        found_unsat: outcome.found_unsat,
    }))
}

/// Evaluate every instance in order, sharing one sampler so results only
/// depend on the seed.
pub fn evaluate<O: UnsatOracle>(
    instances: &[Instance],
    oracle: &O,
    sampler: &mut SubsetSampler,
    config: &EvalConfig,
) -> Result<Evaluation, EvalError> {
    let pb = progress_bar(instances.len(), config.progress);
    let mut evaluation = Evaluation::default();
    for (index, instance) in instances.iter().enumerate() {
        match evaluate_instance(index, instance, oracle, sampler, config)? {
            Some(result) => {
                pb.suspend(|| {
                    log::debug!(
                        "instance {index}: {}/{} constraints kept, core {}, {}",
                        result.subset_size,
                        result.num_constraints,
                        result.core_size,
                        if result.found_unsat { "unsat" } else { "not found" }
                    )
                });
                evaluation.results.push(result);
            }
            None => {
                pb.suspend(|| {
                    log::warn!("instance {index} is not unsat according to the solver, skipping")
                });
                evaluation.skipped.push(index);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::{evaluate, EvalConfig};
    use crate::{
        dataset::Instance,
        error::EvalError,
        formula::{Formula, DEFAULT_LOGIC},
        sampling::SubsetSampler,
        verifier::{UnsatOracle, Verdict},
    };
    use smtlib::proc::SatResp;
    use std::{
        cell::{Cell, RefCell},
        collections::HashMap,
    };

    /// Knows the core of each instance (keyed by instance size) and declares
    /// a formula unsat exactly when it contains the whole core.
    struct FakeOracle {
        cores: HashMap<usize, Vec<usize>>,
        current: RefCell<Option<Vec<usize>>>,
        checks: Cell<usize>,
    }

    impl UnsatOracle for FakeOracle {
        fn check(&self, formula: &Formula) -> Result<Verdict, EvalError> {
            self.checks.set(self.checks.get() + 1);
            let unsat = self
                .current
                .borrow()
                .as_ref()
                .is_some_and(|core| core.iter().all(|i| formula.selection().contains(i)));
            Ok(Verdict {
                resp: if unsat { SatResp::Unsat } else { SatResp::Sat },
                statistics: None,
            })
        }

        fn unsat_core(&self, formula: &Formula) -> Result<Option<Vec<usize>>, EvalError> {
            let core = self.cores.get(&formula.selection().len()).cloned();
            *self.current.borrow_mut() = core.clone();
            Ok(core)
        }
    }

    /// Has a core (or not) but never settles a sampled subset.
    struct GivesUp {
        core: Option<Vec<usize>>,
    }

    impl UnsatOracle for GivesUp {
        fn check(&self, _formula: &Formula) -> Result<Verdict, EvalError> {
            Ok(Verdict {
                resp: SatResp::Unknown("timeout".to_string()),
                statistics: None,
            })
        }

        fn unsat_core(&self, _formula: &Formula) -> Result<Option<Vec<usize>>, EvalError> {
            Ok(self.core.clone())
        }
    }

    fn instance(n: usize) -> Instance {
        Instance {
            constraints: (0..n).map(|i| format!("x != {i}")).collect(),
            smt2_constraints: (0..n).map(|i| format!("(not (= x {i}))")).collect(),
            smt2_formula_placeholder: "(declare-fun x () Int)\n<ASSERT>".to_string(),
        }
    }

    #[test]
    fn test_evaluate() {
        let instances: Vec<Instance> = [3, 12, 4].into_iter().map(instance).collect();
        let oracle = FakeOracle {
            cores: HashMap::from([(3, vec![0]), (12, vec![1, 2])]),
            current: RefCell::new(None),
            checks: Cell::new(0),
        };
        let config = EvalConfig {
            attempts: 5,
            default_logic: DEFAULT_LOGIC.to_string(),
            progress: false,
        };
        let mut sampler = SubsetSampler::new(42);
        let evaluation = evaluate(&instances, &oracle, &mut sampler, &config).unwrap();

        assert_eq!(evaluation.skipped, vec![2]);
        assert_eq!(evaluation.results.len(), 2);
        let attempts: usize = evaluation.results.iter().map(|r| r.attempts).sum();
        assert_eq!(attempts, oracle.checks.get());
        for r in &evaluation.results {
            assert!(r.attempts >= 1 && r.attempts <= 5);
            assert!(r.subset_size <= r.num_constraints);
            assert!(r.found_unsat || r.attempts == 5);
        }
        assert_eq!(evaluation.results[0].core_size, 1);
        assert_eq!(evaluation.results[1].core_size, 2);
        assert_eq!(evaluation.results[1].num_constraints, 12);

        // same seed, same results
        let mut sampler = SubsetSampler::new(42);
        let again = evaluate(&instances, &oracle, &mut sampler, &config).unwrap();
        assert_eq!(again, evaluation);
    }

    #[test]
    fn test_unknown_subsets_are_not_unsat() {
        let instances: Vec<Instance> = [3, 15].into_iter().map(instance).collect();
        let oracle = GivesUp {
            core: Some(vec![0]),
        };
        let config = EvalConfig {
            attempts: 4,
            default_logic: DEFAULT_LOGIC.to_string(),
            progress: false,
        };
        let evaluation =
            evaluate(&instances, &oracle, &mut SubsetSampler::new(42), &config).unwrap();
        assert!(evaluation.skipped.is_empty());
        assert_eq!(evaluation.results.len(), 2);
        for r in &evaluation.results {
            assert!(!r.found_unsat);
            assert_eq!(r.attempts, 4);
            assert_eq!(r.core_size, 1);
        }
    }

    #[test]
    fn test_unknown_full_formula_is_skipped() {
        let instances: Vec<Instance> = [3, 15].into_iter().map(instance).collect();
        let config = EvalConfig {
            attempts: 4,
            default_logic: DEFAULT_LOGIC.to_string(),
            progress: false,
        };
        let evaluation = evaluate(
            &instances,
            &GivesUp { core: None },
            &mut SubsetSampler::new(42),
            &config,
        )
        .unwrap();
        assert!(evaluation.results.is_empty());
        assert_eq!(evaluation.skipped, vec![0, 1]);
    }
}
