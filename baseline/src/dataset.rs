// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Loading the unsatisfiable string-constraint benchmark.

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Evaluation split of the benchmark.
#[allow(missing_docs)]
#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Val,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Val => write!(f, "val"),
            Split::Test => write!(f, "test"),
        }
    }
}

/// One unsatisfiable formula of the benchmark.
///
/// `constraints[i]` is the human-readable rendering of `smt2_constraints[i]`.
/// The placeholder is the full SMT-LIB script with all assertions replaced by
/// a single `<ASSERT>` keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Constraints as text
    pub constraints: Vec<String>,
    /// Constraints in SMT-LIB syntax
    pub smt2_constraints: Vec<String>,
    /// SMT-LIB script with an `<ASSERT>` placeholder for the assertions
    pub smt2_formula_placeholder: String,
}

impl Instance {
    /// Number of constraints in the formula.
    pub fn len(&self) -> usize {
        self.smt2_constraints.len()
    }

    /// Whether the formula has no constraints at all.
    pub fn is_empty(&self) -> bool {
        self.smt2_constraints.is_empty()
    }

    /// Check that the textual and SMT-LIB constraints correspond.
    pub fn validate(&self, index: usize) -> Result<(), EvalError> {
        if self.constraints.len() != self.smt2_constraints.len() {
            return Err(EvalError::MismatchedConstraints {
                index,
                constraints: self.constraints.len(),
                smt2: self.smt2_constraints.len(),
            });
        }
        Ok(())
    }
}

/// The benchmark file for a split, under `dir`.
pub fn benchmark_path(dir: &Path, split: Split) -> PathBuf {
    dir.join(format!("unsat.Leetcode.{split}.json"))
}

/// Load and validate every instance of a split.
pub fn load(dir: &Path, split: Split) -> Result<Vec<Instance>, EvalError> {
    let path = benchmark_path(dir, split);
    log::info!("Loading data from {}", path.display());
    let f = File::open(&path).map_err(EvalError::io(&path))?;
    let instances: Vec<Instance> =
        serde_json::from_reader(BufReader::new(f)).map_err(EvalError::json(&path))?;
    for (index, instance) in instances.iter().enumerate() {
        instance.validate(index)?;
    }
    log::info!("Loaded {} instances", instances.len());
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::{benchmark_path, load, Split};
    use crate::error::EvalError;
    use std::{fs, path::Path};

    #[test]
    fn test_benchmark_path() {
        assert_eq!(
            benchmark_path(Path::new("../dataset"), Split::Val),
            Path::new("../dataset/unsat.Leetcode.val.json")
        );
    }

    #[test]
    fn test_load_ignores_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("unsat.Leetcode.test.json"),
            r#"[{
                "id": "two-sum-17",
                "constraints": ["x == \"a\"", "x != \"a\""],
                "smt2_constraints": ["(= x \"a\")", "(not (= x \"a\"))"],
                "smt2_formula_placeholder": "(declare-fun x () String)\n<ASSERT>\n(check-sat)"
            }]"#,
        )
        .unwrap();
        let instances = load(dir.path(), Split::Test).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].len(), 2);
        assert_eq!(instances[0].constraints[0], "x == \"a\"");
    }

    #[test]
    fn test_load_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("unsat.Leetcode.val.json"),
            r#"[{
                "constraints": ["a"],
                "smt2_constraints": [],
                "smt2_formula_placeholder": "<ASSERT>"
            }]"#,
        )
        .unwrap();
        let err = load(dir.path(), Split::Val).unwrap_err();
        assert!(matches!(
            err,
            EvalError::MismatchedConstraints {
                index: 0,
                constraints: 1,
                smt2: 0
            }
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), Split::Test).unwrap_err();
        assert!(matches!(err, EvalError::Io { .. }));
    }
}
