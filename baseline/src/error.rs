// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Errors raised while loading, checking and reporting on benchmark
//! instances.

use std::{io, path::PathBuf};

use smtlib::proc::SolverError;
use thiserror::Error;

/// An error from the evaluation pipeline.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A file could not be read or written
    #[error("could not access {path}: {source}")]
    Io {
        /// The file being accessed
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },
    /// A file did not contain the expected JSON
    #[error("could not parse {path}: {source}")]
    Json {
        /// The file being parsed
        path: PathBuf,
        /// The underlying error
        source: serde_json::Error,
    },
    /// An instance has different numbers of textual and SMT-LIB constraints
    #[error("instance {index} has {constraints} constraints but {smt2} SMT-LIB constraints")]
    MismatchedConstraints {
        /// Position of the instance in the benchmark
        index: usize,
        /// Number of textual constraints
        constraints: usize,
        /// Number of SMT-LIB constraints
        smt2: usize,
    },
    /// Some SMT-LIB text in an instance does not parse
    #[error("instance {index}: could not parse {what}: {msg}")]
    Parse {
        /// Position of the instance in the benchmark
        index: usize,
        /// Which part of the instance failed
        what: String,
        /// Parser error message
        msg: String,
    },
    /// The formula template has nowhere to put the assertions
    #[error("instance {index}: formula template has no {placeholder} placeholder")]
    MissingPlaceholder {
        /// Position of the instance in the benchmark
        index: usize,
        /// The expected placeholder keyword
        placeholder: &'static str,
    },
    /// A constraint given as text is not part of the instance
    #[error("instance {index} has no (unused) constraint `{text}`")]
    UnknownConstraint {
        /// Position of the instance in the benchmark
        index: usize,
        /// The unmatched text
        text: String,
    },
    /// A constraint index is out of range
    #[error("instance {index} has no constraint {constraint}")]
    NoSuchConstraint {
        /// Position of the instance in the benchmark
        index: usize,
        /// The out-of-range constraint index
        constraint: usize,
    },
    /// An instance index is out of range
    #[error("no instance {index} (benchmark has {len} instances)")]
    NoSuchInstance {
        /// The requested instance
        index: usize,
        /// Number of instances in the benchmark
        len: usize,
    },
    /// The solver failed
    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| EvalError::Io { path, source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.into();
        move |source| EvalError::Json { path, source }
    }
}
