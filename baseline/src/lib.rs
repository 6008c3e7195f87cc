// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A naive baseline for constraint minimization.
//!
//! Given unsatisfiable sets of SMT constraints, the baseline draws random
//! subsets until one is unsatisfiable, and measures how much smaller that
//! subset is than the original set, relative to the solver's own unsat core.

#![deny(missing_docs)]
// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::upper_case_acronyms)]
#![deny(clippy::uninlined_format_args)]
// documentation-related lints (only checked when running rustdoc)
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod command;
pub mod dataset;
pub mod error;
pub mod formula;
pub mod report;
pub mod run;
pub mod sampling;
pub mod stratify;
pub mod verifier;

#[doc(hidden)]
pub use command::App;
