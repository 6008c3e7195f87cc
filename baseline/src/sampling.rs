// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The naive baseline: uniformly random subsets of an instance's constraints.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default seed of the subset sampler.
pub const DEFAULT_SEED: u64 = 42;

/// Outcome of searching one instance for an unsatisfiable subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// The last subset tried (the unsatisfiable one if the search succeeded).
    pub subset: Vec<usize>,
    /// Number of subsets tried.
    pub attempts: usize,
    /// Whether `subset` was shown unsatisfiable.
    pub found_unsat: bool,
}

/// Draws subsets of `0..n`, keeping every element independently with
/// probability 1/2 (a uniform draw from the power set).
#[derive(Debug, Clone)]
pub struct SubsetSampler {
    rng: StdRng,
}

impl SubsetSampler {
    /// A sampler with a fixed seed, so runs are reproducible.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw one subset of `0..n`, in increasing order.
    pub fn sample(&mut self, n: usize) -> Vec<usize> {
        (0..n).filter(|_| self.rng.gen_bool(0.5)).collect()
    }

    /// Draw up to `attempts` subsets of `0..n`, stopping at the first one for
    /// which `is_unsat` holds.
    ///
    /// Panics if `attempts` is zero, since there would be no subset to report.
    pub fn search<F, E>(
        &mut self,
        n: usize,
        attempts: usize,
        mut is_unsat: F,
    ) -> Result<SearchOutcome, E>
    where
        F: FnMut(&[usize]) -> Result<bool, E>,
    {
        assert!(attempts > 0, "need at least one attempt");
        let mut subset = vec![];
        for attempt in 1..=attempts {
            subset = self.sample(n);
            let found_unsat = is_unsat(&subset)?;
            log::debug!(
                "attempt {attempt}/{attempts}: {} of {n} constraints, {}",
                subset.len(),
                if found_unsat { "unsat" } else { "not unsat" }
            );
            if found_unsat {
                return Ok(SearchOutcome {
                    subset,
                    attempts: attempt,
                    found_unsat: true,
                });
            }
        }
        Ok(SearchOutcome {
            subset,
            attempts,
            found_unsat: false,
        })
    }
}

impl Default for SubsetSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
