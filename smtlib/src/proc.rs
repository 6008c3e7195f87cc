// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A solver process spoken to over its stdin and stdout.
//!
//! Only the [`SolverCmd`] used to launch it knows which solver is running.
//! Each [`SmtProc`] owns one process and kills it on drop.

use crate::conf::SolverCmd;
use crate::sexp;
use crate::tee::Tee;
use std::{
    ffi::{OsStr, OsString},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};
use thiserror::Error;

use super::sexp::{app, atom_s, Sexp};

/// A running solver.
#[derive(Debug)]
pub struct SmtProc {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    tee: Option<Tee>,
}

/// Answer to a `(check-sat)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResp {
    /// The query is satisfiable.
    Sat,
    /// The query is unsatisfiable.
    Unsat,
    /// The solver gave up, with the reason from `(get-info :reason-unknown)`.
    /// Timeouts and incomplete string reasoning end up here.
    Unknown(String),
}

#[derive(Error, Debug)]
/// Failure to get an answer out of the solver
pub enum SolverError {
    /// I/O went wrong
    #[error("solver I/O failed: {0}")]
    Io(#[from] io::Error),
    /// Solver returned an `(error ...)` response or exited early
    #[error("solver reported an error:\n{0}")]
    UnexpectedClose(String),
    /// Solver returned something that could not be understood
    #[error("malformed solver response:\n{0}")]
    Malformed(String),
}

type Result<T> = std::result::Result<T, SolverError>;

impl Drop for SmtProc {
    fn drop(&mut self) {
        self.kill();
    }
}

impl SmtProc {
    /// Launch `cmd` and send it its startup options. Unsat cores are always
    /// enabled.
    ///
    /// With `tee`, everything sent is also recorded for saving under that
    /// directory.
    pub fn new(mut cmd: SolverCmd, tee: Option<&Path>) -> Result<Self> {
        cmd.option("produce-unsat-cores", "true");
        let mut child = Command::new(OsStr::new(&cmd.cmd))
            .args(cmd.args.iter().map(OsString::from))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let tee = tee.map(|path| {
            let mut f = Tee::new(path);
            f.append(Sexp::Comment(cmd.cmdline()));
            f
        });
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SolverError::UnexpectedClose(
                "solver pipes were not available".to_string(),
            ));
        };
        let mut proc = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            tee,
        };
        for (option, val) in &cmd.options {
            proc.send(&app(
                "set-option",
                [atom_s(format!(":{option}")), atom_s(val)],
            ))?;
        }
        Ok(proc)
    }

    /// Send a command that produces no output, such as an assertion.
    pub fn send(&mut self, data: &Sexp) -> Result<()> {
        writeln!(self.stdin, "{data}")?;
        if let Some(f) = &mut self.tee {
            f.append(data.clone());
        }
        Ok(())
    }

    /// Send a command and parse its one-sexp answer.
    fn send_with_reply(&mut self, data: &Sexp) -> Result<Sexp> {
        self.send(data)?;
        let resp = self.get_response(|s| s.to_string())?;
        match sexp::parse(&resp) {
            Ok(s) if !s.is_app("error") => Ok(s),
            _ => Err(Self::get_error(&resp)),
        }
    }

    /// Echoed after every command that answers, to find where the answer ends.
    const DONE: &'static str = "<<DONE>>";

    fn write_stdin(&mut self, line: &str) -> std::result::Result<(), io::Error> {
        writeln!(self.stdin, "{line}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Read everything the solver prints up to the [`Self::DONE`] marker, which
    /// this sends. Call exactly once per answering command.
    fn get_response<F, T>(&mut self, cb: F) -> Result<T>
    where
        F: FnOnce(&str) -> T,
    {
        if let Err(err) = self.write_stdin(&format!(r#"(echo "{}")"#, Self::DONE)) {
            if err.kind() == io::ErrorKind::BrokenPipe {
                return Err(SolverError::UnexpectedClose(
                    "solver closed its input".to_string(),
                ));
            }
            return Err(SolverError::from(err));
        }
        let mut buf = String::new();
        loop {
            let last_end = buf.len();
            let n = self.stdout.read_line(&mut buf)?;
            if n == 0 {
                return Err(Self::get_error(&buf));
            }
            let last_line = buf[last_end..last_end + n].trim_end();
            // z3 echoes the marker bare, cvc quoted
            if last_line == Self::DONE || last_line == format!("\"{}\"", Self::DONE) {
                let response = buf[..last_end].trim_end();
                return Ok(cb(response));
            }
        }
    }

    fn kill(&mut self) {
        _ = writeln!(self.stdin, "(exit)");
        _ = self.stdin.flush();
        _ = self.child.kill();
        _ = self.child.wait();
    }

    /// Build the error for a response presumed to contain an error.
    fn get_error(resp: &str) -> SolverError {
        SolverError::UnexpectedClose(Self::parse_error(resp))
    }

    /// The message of the first `(error ..)` in `resp`.
    fn parse_error(resp: &str) -> String {
        // z3 may print `(error "..")` before the actual answer
        let error_msg = sexp::parse_many(resp).ok().and_then(|sexps| {
            sexps.iter().find_map(|s| {
                s.app().and_then(|(head, args)| {
                    if head == "error" && args.len() == 1 {
                        args[0].atom_str().or_else(|| args[0].atom_s()).map(String::from)
                    } else {
                        None
                    }
                })
            })
        });
        match error_msg {
            Some(msg) => msg,
            None if resp.trim().is_empty() => "solver exited without a response".to_string(),
            None => resp.trim().to_string(),
        }
    }

    fn parse_sat(&mut self, resp: &str) -> Result<SatResp> {
        match resp {
            "unsat" => Ok(SatResp::Unsat),
            "sat" => Ok(SatResp::Sat),
            "unknown" => {
                let reason = self.get_info(":reason-unknown")?;
                let reason = match reason.atom_str() {
                    Some(s) => s.to_string(),
                    None => reason.to_string(),
                };
                Ok(SatResp::Unknown(reason))
            }
            _ => Err(Self::get_error(resp)),
        }
    }

    /// Send the solver `(check-sat)`. For unknown gets a reason and saves the
    /// tee'd query, if any.
    pub fn check_sat(&mut self) -> Result<SatResp> {
        self.send(&app("check-sat", []))?;
        let resp = self.get_response(|s| s.to_string())?;
        let resp = self.parse_sat(&resp)?;
        if let SatResp::Unknown(reason) = &resp {
            if let Some(name) = self.save_tee() {
                log::warn!("unknown ({reason}) response to {}", name.display());
            }
        }
        Ok(resp)
    }

    /// Run `(get-unsat-core)` following an unsat response to get the names of
    /// the assertions used in the proof.
    ///
    /// Fails if the previous command wasn't a check_sat that returned unsat.
    pub fn get_unsat_core(&mut self) -> Result<Vec<Sexp>> {
        let sexp = self.send_with_reply(&app("get-unsat-core", []))?;
        match sexp {
            Sexp::List(ss) => Ok(ss),
            _ => Err(SolverError::Malformed(format!(
                "malformed get-unsat-core response: {sexp}"
            ))),
        }
    }

    /// Get some attribute using the SMT get-info command.
    ///
    /// Solvers answer with `(attribute value)`; the value is returned. Any
    /// other well-formed answer is returned as is.
    pub fn get_info(&mut self, attribute: &str) -> Result<Sexp> {
        let resp = self.send_with_reply(&app("get-info", [atom_s(attribute)]))?;
        if let Some(s) = resp.list() {
            if s.len() == 2 && s[0] == atom_s(attribute) {
                return Ok(s[1].clone());
            }
        }
        Ok(resp)
    }

    /// Get the solver's statistics as `(name, value)` pairs, with the leading
    /// `:` stripped from each name.
    ///
    /// Accepts both the keyword/value list printed by Z3 and a list of
    /// two-element lists.
    pub fn get_statistics(&mut self) -> Result<Vec<(String, String)>> {
        let resp = self.get_info(":all-statistics")?;
        let Some(items) = resp.list() else {
            return Err(SolverError::Malformed(format!(
                "malformed statistics response: {resp}"
            )));
        };
        let key = |s: &Sexp| s.atom_s().map(|k| k.trim_start_matches(':').to_string());
        let mut stats = vec![];
        let mut iter = items.iter().filter(|s| !matches!(s, Sexp::Comment(_)));
        while let Some(item) = iter.next() {
            if let Some(pair) = item.list() {
                if let [name, value] = pair {
                    if let Some(name) = key(name) {
                        stats.push((name, value.to_string()));
                        continue;
                    }
                }
                return Err(SolverError::Malformed(format!(
                    "malformed statistic: {item}"
                )));
            }
            match (key(item), iter.next()) {
                (Some(name), Some(value)) => stats.push((name, value.to_string())),
                _ => {
                    return Err(SolverError::Malformed(format!(
                        "malformed statistic: {item}"
                    )))
                }
            }
        }
        Ok(stats)
    }

    // =============
    // Tee support
    // =============

    /// Save the current tee file, if there is one. Returns the path of the
    /// created file (or None if there is no tee'd output setup).
    ///
    /// Failing to save is reported but is not fatal.
    pub fn save_tee(&self) -> Option<PathBuf> {
        self.tee.as_ref().and_then(|tee| match tee.save() {
            Ok(name) => Some(name),
            Err(err) => {
                log::error!("failed to save tee: {err}");
                None
            }
        })
    }

    /// Add a comment to the tee'd file.
    ///
    /// The comment is passed as a closure, which is not evaluated if there is
    /// no tee'd smt2 file.
    pub fn comment_with<F>(&mut self, comment: F)
    where
        F: FnOnce() -> String,
    {
        if let Some(f) = &mut self.tee {
            let comment = comment();
            f.append(Sexp::Comment("".to_string()));
            f.append(Sexp::Comment(comment));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        conf::{CvcConf, SolverCmd, Z3Conf},
        path::solver_path,
        proc::{SatResp, SmtProc, SolverError},
        sexp::{app, atom_s, parse},
    };
    use eyre::Context;

    /// Launch a solver, or return None (skipping the test) if it isn't
    /// installed.
    fn launch(cmd: SolverCmd) -> Option<SmtProc> {
        match SmtProc::new(cmd.clone(), None) {
            Ok(proc) => Some(proc),
            Err(_) => {
                eprintln!("could not find {}, skipping test", cmd.cmd);
                None
            }
        }
    }

    fn z3() -> Option<SmtProc> {
        launch(Z3Conf::new(&solver_path("z3")).done())
    }

    fn cvc5() -> Option<SmtProc> {
        let mut conf = CvcConf::new_cvc5(&solver_path("cvc5"));
        conf.strings_exp();
        launch(conf.done())
    }

    #[test]
    fn test_check_sat_z3() {
        let Some(mut solver) = z3() else { return };
        let response = solver.check_sat().wrap_err("could not check-sat").unwrap();
        assert!(
            matches!(response, SatResp::Sat { .. }),
            "should be sat, got {response:?}"
        );
    }

    #[test]
    fn test_unsat_core_z3() {
        let Some(mut solver) = z3() else { return };
        solver
            .send(&app("declare-const", [atom_s("a"), atom_s("Bool")]))
            .unwrap();
        solver
            .send(&app("declare-const", [atom_s("b"), atom_s("Bool")]))
            .unwrap();
        for e in [
            "(assert (! a :named c_0))",
            "(assert (! b :named c_1))",
            "(assert (! (not a) :named c_2))",
        ] {
            solver.send(&parse(e).unwrap()).unwrap();
        }

        let response = solver.check_sat().wrap_err("could not check-sat").unwrap();
        insta::assert_debug_snapshot!(response, @"Unsat");
        let mut core: Vec<String> = solver
            .get_unsat_core()
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        core.sort();
        assert_eq!(core, vec!["c_0", "c_2"]);
    }

    #[test]
    fn test_string_unsat_cvc5() {
        let Some(mut solver) = cvc5() else { return };
        solver.send(&parse("(set-logic QF_SLIA)").unwrap()).unwrap();
        solver
            .send(&parse("(declare-fun x () String)").unwrap())
            .unwrap();
        solver
            .send(&parse(r#"(assert (= (str.len x) 3))"#).unwrap())
            .unwrap();
        solver
            .send(&parse(r#"(assert (str.prefixof "abcd" x))"#).unwrap())
            .unwrap();
        let response = solver.check_sat().wrap_err("could not check-sat").unwrap();
        insta::assert_debug_snapshot!(response, @"Unsat");
    }

    #[test]
    fn test_statistics_z3() {
        let Some(mut solver) = z3() else { return };
        solver.send(&parse("(assert false)").unwrap()).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResp::Unsat);
        let stats = solver.get_statistics().unwrap();
        assert!(!stats.is_empty());
        assert!(stats.iter().all(|(name, _)| !name.starts_with(':')));
    }

    #[test]
    fn test_spawn_many() {
        let z3 = Z3Conf::new(&solver_path("z3")).done();
        if launch(z3.clone()).is_none() {
            return;
        }
        for _ in 0..100 {
            let _ = SmtProc::new(z3.clone(), None).unwrap();
        }
    }

    #[test]
    fn test_z3_ill_formed() {
        let Some(mut proc) = z3() else { return };
        // unbound symbol
        let e = parse("(assert p)").unwrap();
        proc.send(&e).unwrap();
        let r = proc.check_sat();
        assert!(
            matches!(r, Err(SolverError::UnexpectedClose(_))),
            "expected a solver error, got {r:?}"
        );
    }

    #[test]
    fn test_missing_binary() {
        let cmd = Z3Conf::new("definitely-not-a-solver-binary").done();
        let r = SmtProc::new(cmd, None);
        assert!(matches!(r, Err(SolverError::Io(_))));
    }

    #[test]
    fn test_parse_error_message() {
        let msg = SmtProc::parse_error("(error \"line 1 column 8: unknown constant p\")\nsat");
        assert_eq!(msg, "line 1 column 8: unknown constant p");
        assert_eq!(
            SmtProc::parse_error(""),
            "solver exited without a response"
        );
    }
}
