// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Per-instance results and their aggregation into size buckets.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Width of the constraint-count intervals.
pub const BUCKET_WIDTH: usize = 10;

/// What the baseline achieved on one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceResult {
    /// Position of the instance in the benchmark
    pub index: usize,
    /// Number of constraints in the instance
    pub num_constraints: usize,
    /// Size of the solver's unsat core of the full instance
    pub core_size: usize,
    /// Size of the last sampled subset
    pub subset_size: usize,
    /// Number of subsets sampled
    pub attempts: usize,
    /// Whether the last sampled subset is unsatisfiable
    pub found_unsat: bool,
}

impl InstanceResult {
    /// Constraints removed by the subset, relative to the constraints removed
    /// by the unsat core. Zero if the core is the whole instance.
    pub fn ratio(&self) -> f64 {
        let removable = self.num_constraints.saturating_sub(self.core_size);
        if removable == 0 {
            return 0.0;
        }
        self.num_constraints.saturating_sub(self.subset_size) as f64 / removable as f64
    }

    /// Fraction of the constraints removed by the subset.
    pub fn reduction(&self) -> f64 {
        if self.num_constraints == 0 {
            return 0.0;
        }
        self.num_constraints.saturating_sub(self.subset_size) as f64 / self.num_constraints as f64
    }

    /// The interval this instance is reported under.
    pub fn bucket(&self) -> Bucket {
        Bucket::of_size(self.num_constraints)
    }
}

/// A row of the stratified report: an interval of constraint counts, or the
/// total over all instances. Intervals sort numerically, before the total.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    /// Instances with `lower..lower + BUCKET_WIDTH` constraints
    Interval(usize),
    /// All instances
    Total,
}

impl Bucket {
    /// The interval containing `n`.
    pub fn of_size(n: usize) -> Self {
        Bucket::Interval(n - n % BUCKET_WIDTH)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Interval(lower) => write!(f, "{lower}-{}", lower + BUCKET_WIDTH),
            Bucket::Total => write!(f, "Total"),
        }
    }
}

/// Running totals for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    /// Instances where an unsatisfiable subset was found
    pub correct: usize,
    /// All instances
    pub total: usize,
    /// Sum of [`InstanceResult::ratio`] over all instances, found or not
    pub ratio_sum: f64,
}

impl BucketStats {
    fn add(&mut self, result: &InstanceResult) {
        if result.found_unsat {
            self.correct += 1;
        }
        self.total += 1;
        self.ratio_sum += result.ratio();
    }

    /// Ratio sum per successful instance; zero when nothing succeeded.
    pub fn adjusted(&self) -> f64 {
        if self.correct == 0 {
            return 0.0;
        }
        self.ratio_sum / self.correct as f64
    }

    /// Ratio sum per instance.
    pub fn absolute(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.ratio_sum / self.total as f64
    }
}

fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

/// Aggregated results, bucketed by instance size.
#[derive(Debug, Clone, Default)]
pub struct Stratification {
    buckets: BTreeMap<Bucket, BucketStats>,
    reductions: Vec<f64>,
    reductions_found: Vec<f64>,
}

impl Stratification {
    /// An empty aggregation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a sequence of results.
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a InstanceResult>,
    {
        let mut s = Self::new();
        for r in results {
            s.add(r);
        }
        s
    }

    /// Add one instance's result to its bucket and to the total.
    pub fn add(&mut self, result: &InstanceResult) {
        self.buckets.entry(result.bucket()).or_default().add(result);
        self.buckets.entry(Bucket::Total).or_default().add(result);
        if result.found_unsat {
            self.reductions.push(result.reduction());
            self.reductions_found.push(result.reduction());
        } else {
            self.reductions.push(0.0);
        }
    }

    /// Buckets in report order.
    pub fn buckets(&self) -> impl Iterator<Item = (&Bucket, &BucketStats)> {
        self.buckets.iter()
    }

    /// Stats of one bucket, if any instance fell into it.
    pub fn get(&self, bucket: Bucket) -> Option<&BucketStats> {
        self.buckets.get(&bucket)
    }

    /// Mean fraction of constraints removed, counting failed instances as 0.
    pub fn mean_reduction(&self) -> Option<f64> {
        mean(&self.reductions)
    }

    /// Mean fraction of constraints removed over successful instances only.
    pub fn mean_reduction_corrected(&self) -> Option<f64> {
        mean(&self.reductions_found)
    }
}

#[cfg(test)]
mod tests {
    use super::{Bucket, InstanceResult, Stratification};

    fn result(index: usize, n: usize, core: usize, subset: usize, found: bool) -> InstanceResult {
        InstanceResult {
            index,
            num_constraints: n,
            core_size: core,
            subset_size: subset,
            attempts: 1,
            found_unsat: found,
        }
    }

    #[test]
    fn test_bucket_keys() {
        assert_eq!(Bucket::of_size(0).to_string(), "0-10");
        assert_eq!(Bucket::of_size(9).to_string(), "0-10");
        assert_eq!(Bucket::of_size(10).to_string(), "10-20");
        assert_eq!(Bucket::of_size(47).to_string(), "40-50");
        assert_eq!(Bucket::Total.to_string(), "Total");
    }

    #[test]
    fn test_bucket_order_is_numeric() {
        let mut buckets = vec![
            Bucket::Total,
            Bucket::of_size(105),
            Bucket::of_size(23),
            Bucket::of_size(3),
        ];
        buckets.sort();
        let labels: Vec<String> = buckets.iter().map(|b| b.to_string()).collect();
        assert_eq!(labels, vec!["0-10", "20-30", "100-110", "Total"]);
    }

    #[test]
    fn test_ratio_and_reduction() {
        let r = result(0, 10, 2, 4, true);
        assert_eq!(r.ratio(), 6.0 / 8.0);
        assert_eq!(r.reduction(), 0.6);
        // the core is the whole instance
        assert_eq!(result(0, 5, 5, 5, true).ratio(), 0.0);
        assert_eq!(result(0, 0, 0, 0, false).reduction(), 0.0);
    }

    #[test]
    fn test_stratification() {
        let results = vec![
            result(0, 4, 2, 3, true),
            result(1, 6, 2, 2, false),
            result(2, 12, 2, 7, true),
        ];
        let s = Stratification::from_results(&results);

        let small = s.get(Bucket::Interval(0)).unwrap();
        assert_eq!((small.correct, small.total), (1, 2));
        // ratios 1/2 and 4/4; failed instances still count
        assert_eq!(small.ratio_sum, 1.5);
        assert_eq!(small.adjusted(), 1.5);
        assert_eq!(small.absolute(), 0.75);

        let total = s.get(Bucket::Total).unwrap();
        assert_eq!((total.correct, total.total), (2, 3));
        assert_eq!(total.ratio_sum, 2.0);

        let order: Vec<String> = s.buckets().map(|(b, _)| b.to_string()).collect();
        assert_eq!(order, vec!["0-10", "10-20", "Total"]);

        // reductions: 1/4, 0 (failed), 5/12
        let mean = s.mean_reduction().unwrap();
        assert!((mean - (0.25 + 5.0 / 12.0) / 3.0).abs() < 1e-12);
        let corrected = s.mean_reduction_corrected().unwrap();
        assert!((corrected - (0.25 + 5.0 / 12.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_successes() {
        let s = Stratification::from_results(&[result(0, 3, 1, 2, false)]);
        assert_eq!(s.mean_reduction(), Some(0.0));
        assert_eq!(s.mean_reduction_corrected(), None);
        assert_eq!(s.get(Bucket::Total).unwrap().adjusted(), 0.0);
        assert!(Stratification::new().mean_reduction().is_none());
    }
}
