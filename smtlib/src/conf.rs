// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Command lines and startup options for Z3, CVC4 and CVC5.

use serde::{Deserialize, Serialize};

/// The full invocation of a solver binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverCmd {
    /// Binary to launch
    pub cmd: String,
    /// Arguments to pass
    pub args: Vec<String>,
    /// SMT options to send on startup
    pub options: Vec<(String, String)>,
}

impl SolverCmd {
    fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            args: vec![],
            options: vec![],
        }
    }

    fn args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
    }

    /// Set an option. Setting an option again replaces its earlier value.
    pub fn option<S: AsRef<str>>(&mut self, name: &str, val: S) {
        let val = val.as_ref().to_string();
        match self.options.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = val,
            None => self.options.push((name.to_string(), val)),
        }
    }

    /// Build the command line string, for printing purposes.
    pub fn cmdline(&self) -> String {
        let args: Vec<_> = self
            .args
            .iter()
            .map(|a| {
                if a.contains(' ') {
                    format!("\"{a}\"")
                } else {
                    a.to_string()
                }
            })
            .collect();
        format!("{} {}", &self.cmd, args.join(" "))
    }
}

/// Builder for creating a Z3 [`SolverCmd`].
#[derive(Debug, Clone)]
pub struct Z3Conf(SolverCmd);

impl Z3Conf {
    /// Start configuring Z3, launched as `cmd`.
    pub fn new(cmd: &str) -> Self {
        let mut cmd = SolverCmd::new(cmd);
        cmd.args(["-in", "-smt2"]);
        let mut conf = Self(cmd);
        conf.timeout_ms(None);
        conf
    }

    /// Set the per-query timeout. None means Z3's own default, which is
    /// effectively unlimited.
    pub fn timeout_ms(&mut self, ms: Option<usize>) {
        let ms = ms.unwrap_or(u32::MAX as usize);
        self.0.option("timeout", format!("{ms}"));
    }

    /// Ask Z3 to shrink unsat cores before returning them.
    pub fn minimize_cores(&mut self) {
        self.0.option("smt.core.minimize", "true");
    }

    /// Set the random seed of the SMT core.
    pub fn seed(&mut self, seed: usize) {
        self.0.option("smt.random_seed", format!("{seed}"));
    }

    /// Get the final command to run the solver.
    pub fn done(self) -> SolverCmd {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CvcVersion {
    Cvc4,
    Cvc5,
}

/// Builder for a CVC4 or CVC5 [`SolverCmd`].
#[derive(Debug, Clone)]
pub struct CvcConf {
    version: CvcVersion,
    cmd: SolverCmd,
}

impl CvcConf {
    fn new_cvc(cmd: &str, version: CvcVersion) -> Self {
        let mut cmd = SolverCmd::new(cmd);
        // --lang smt2 is needed when reading from stdin
        cmd.args(["-q", "--lang", "smt2"]);
        cmd.option("interactive", "false");
        cmd.option("incremental", "true");
        cmd.option("seed", "1");
        Self { version, cmd }
    }

    /// Create a new CVC4 builder with some default options.
    pub fn new_cvc4(cmd: &str) -> Self {
        Self::new_cvc(cmd, CvcVersion::Cvc4)
    }

    /// Create a new CVC5 builder with some default options.
    pub fn new_cvc5(cmd: &str) -> Self {
        Self::new_cvc(cmd, CvcVersion::Cvc5)
    }

    /// Enable the extended string solver (needed for `str.replace`,
    /// `str.to_int` and friends).
    pub fn strings_exp(&mut self) {
        self.cmd.option("strings-exp", "true");
    }

    /// Ask the solver to return minimal unsat cores. Only CVC5 supports this.
    pub fn minimize_cores(&mut self) {
        match self.version {
            CvcVersion::Cvc5 => self.cmd.option("minimal-unsat-cores", "true"),
            CvcVersion::Cvc4 => log::warn!("cvc4 cannot minimize unsat cores, ignoring"),
        }
    }

    /// Set the random seed.
    pub fn seed(&mut self, seed: usize) {
        self.cmd.option("seed", format!("{seed}"));
    }

    /// Set a per-query time limit. None sets no time limit.
    pub fn timeout_ms(&mut self, ms: Option<usize>) {
        let ms = ms.unwrap_or(0);
        self.cmd.option("tlimit-per", format!("{ms}"));
    }

    /// Get the final command to run the solver.
    pub fn done(self) -> SolverCmd {
        self.cmd
    }
}

#[cfg(test)]
mod tests {
    use super::{CvcConf, Z3Conf};

    #[test]
    fn test_cvc5_options() {
        let mut conf = CvcConf::new_cvc5("cvc5");
        conf.strings_exp();
        conf.minimize_cores();
        conf.seed(7);
        conf.timeout_ms(Some(1000));
        let cmd = conf.done();
        assert_eq!(cmd.cmdline(), "cvc5 -q --lang smt2");
        insta::assert_debug_snapshot!(cmd.options, @r###"
        [
            (
                "interactive",
                "false",
            ),
            (
                "incremental",
                "true",
            ),
            (
                "seed",
                "7",
            ),
            (
                "strings-exp",
                "true",
            ),
            (
                "minimal-unsat-cores",
                "true",
            ),
            (
                "tlimit-per",
                "1000",
            ),
        ]
        "###);
    }

    #[test]
    fn test_z3_timeout_replaced() {
        let mut conf = Z3Conf::new("z3");
        conf.timeout_ms(Some(250));
        let cmd = conf.done();
        assert_eq!(cmd.cmdline(), "z3 -in -smt2");
        assert_eq!(
            cmd.options,
            vec![("timeout".to_string(), "250".to_string())]
        );
    }
}
