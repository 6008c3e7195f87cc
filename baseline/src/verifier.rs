// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Check formulas for unsatisfiability with an external SMT solver.
//!
//! Every check launches a fresh solver process, so no state leaks between
//! the sampled subsets of an instance.

use std::{path::PathBuf, time::Instant};

use serde::{Deserialize, Serialize};
use smtlib::{
    conf::{CvcConf, SolverCmd, Z3Conf},
    proc::{SatResp, SmtProc},
};

use crate::{
    error::EvalError,
    formula::{core_index, Formula},
};

/// The type of solver being used
#[allow(missing_docs)]
#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverType {
    Z3,
    Cvc4,
    Cvc5,
}

impl SolverType {
    /// Name of the solver binary.
    pub fn bin_name(&self) -> &'static str {
        match self {
            SolverType::Z3 => "z3",
            SolverType::Cvc4 => "cvc4",
            SolverType::Cvc5 => "cvc5",
        }
    }
}

/// The result of checking one formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The solver's answer
    pub resp: SatResp,
    /// Solver statistics, if requested and the answer was unsat
    pub statistics: Option<Vec<(String, String)>>,
}

impl Verdict {
    /// Whether the formula was shown unsatisfiable.
    pub fn is_unsat(&self) -> bool {
        self.resp == SatResp::Unsat
    }
}

/// Something that decides unsatisfiability and computes unsat cores.
///
/// [`UnsatVerifier`] is the real implementation; the evaluation loop is
/// generic so it can run against other oracles.
pub trait UnsatOracle {
    /// Check whether `formula` is unsatisfiable.
    fn check(&self, formula: &Formula) -> Result<Verdict, EvalError>;

    /// Compute an unsat core of a formula whose assertions are named. Returns
    /// `None` if the formula is not unsatisfiable.
    fn unsat_core(&self, formula: &Formula) -> Result<Option<Vec<usize>>, EvalError>;
}

#[derive(Debug, Clone)]
struct VerifierOptions {
    timeout_ms: Option<usize>,
    seed: Option<usize>,
    minimize_cores: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            seed: None,
            minimize_cores: true,
        }
    }
}

/// Launches Z3/CVC4/CVC5 with the options needed for unsat checking.
#[derive(Debug, Clone)]
pub struct UnsatVerifier {
    solver_type: SolverType,
    bin: String,
    opts: VerifierOptions,
    tee: Option<PathBuf>,
    statistics: bool,
}

impl UnsatVerifier {
    /// Create a verifier for a given type of solver and with a path to the
    /// solver binary.
    pub fn new(solver_type: SolverType, bin: &str) -> Self {
        Self {
            solver_type,
            bin: bin.to_string(),
            opts: Default::default(),
            tee: None,
            statistics: false,
        }
    }

    /// Set the per-check timeout. None disables the timeout.
    pub fn timeout_ms(&mut self, timeout_ms: Option<usize>) -> &mut Self {
        self.opts.timeout_ms = timeout_ms;
        return self;
    }

    /// Set the solver's random seed.
    pub fn seed(&mut self, seed: Option<usize>) -> &mut Self {
        self.opts.seed = seed;
        return self;
    }

    /// Ask the solver for minimal unsat cores (the default). CVC4 has no
    /// such option and always returns its cores as they are.
    pub fn minimize_cores(&mut self, minimize: bool) -> &mut Self {
        self.opts.minimize_cores = minimize;
        return self;
    }

    /// Save every query sent to a solver to this directory.
    pub fn tee(&mut self, dir: Option<PathBuf>) -> &mut Self {
        self.tee = dir;
        return self;
    }

    /// Collect solver statistics after unsat answers.
    pub fn statistics(&mut self, statistics: bool) -> &mut Self {
        self.statistics = statistics;
        return self;
    }

    /// The full solver invocation.
    pub fn solver_cmd(&self) -> SolverCmd {
        match self.solver_type {
            SolverType::Z3 => {
                let mut conf = Z3Conf::new(&self.bin);
                conf.timeout_ms(self.opts.timeout_ms);
                if let Some(seed) = self.opts.seed {
                    conf.seed(seed);
                }
                if self.opts.minimize_cores {
                    conf.minimize_cores();
                }
                conf.done()
            }
            SolverType::Cvc4 | SolverType::Cvc5 => {
                let mut conf = if self.solver_type == SolverType::Cvc5 {
                    CvcConf::new_cvc5(&self.bin)
                } else {
                    CvcConf::new_cvc4(&self.bin)
                };
                conf.strings_exp();
                conf.timeout_ms(self.opts.timeout_ms);
                if let Some(seed) = self.opts.seed {
                    conf.seed(seed);
                }
                if self.opts.minimize_cores && self.solver_type == SolverType::Cvc5 {
                    conf.minimize_cores();
                }
                conf.done()
            }
        }
    }

    /// Write the query to the tee directory, if any. Unknown answers are
    /// already saved by the solver process itself.
    fn record(&self, proc: &SmtProc, resp: &SatResp) {
        if matches!(resp, SatResp::Unknown(_)) {
            return;
        }
        if let Some(path) = proc.save_tee() {
            log::debug!("saved query to {}", path.display());
        }
    }

    /// Start a solver and send it everything but the final `(check-sat)`.
    fn launch(&self, formula: &Formula) -> Result<SmtProc, EvalError> {
        let mut proc = SmtProc::new(self.solver_cmd(), self.tee.as_deref())?;
        proc.comment_with(|| format!("constraints {:?}", formula.selection()));
        for command in formula.commands() {
            proc.send(command)?;
        }
        Ok(proc)
    }

    fn check_sat(&self, proc: &mut SmtProc, formula: &Formula) -> Result<SatResp, EvalError> {
        let start_time = Instant::now();
        let resp = proc.check_sat()?;
        log::debug!(
            "{:?} returned {resp:?} after {}ms ({} constraints)",
            self.solver_type,
            start_time.elapsed().as_millis(),
            formula.selection().len(),
        );
        Ok(resp)
    }
}

impl UnsatOracle for UnsatVerifier {
    fn check(&self, formula: &Formula) -> Result<Verdict, EvalError> {
        let mut proc = self.launch(formula)?;
        let resp = self.check_sat(&mut proc, formula)?;
        let statistics = if self.statistics && resp == SatResp::Unsat {
            Some(proc.get_statistics()?)
        } else {
            None
        };
        self.record(&proc, &resp);
        Ok(Verdict { resp, statistics })
    }

    fn unsat_core(&self, formula: &Formula) -> Result<Option<Vec<usize>>, EvalError> {
        let mut proc = self.launch(formula)?;
        let resp = self.check_sat(&mut proc, formula)?;
        match &resp {
            SatResp::Unsat => {}
            SatResp::Sat => {
                self.record(&proc, &resp);
                return Ok(None);
            }
            SatResp::Unknown(reason) => {
                log::debug!("unsat core unavailable: {reason}");
                return Ok(None);
            }
        }
        let core = proc.get_unsat_core()?;
        self.record(&proc, &resp);
        let mut indices = core
            .iter()
            .map(|name| {
                name.atom_s().and_then(core_index).ok_or_else(|| {
                    smtlib::proc::SolverError::Malformed(format!(
                        "unexpected name {name} in unsat core"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        indices.sort_unstable();
        indices.dedup();
        Ok(Some(indices))
    }
}
