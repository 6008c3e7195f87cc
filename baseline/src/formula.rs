// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Build SMT-LIB queries for a subset of an instance's constraints.
//!
//! Every instance carries a script template in which all assertions are
//! replaced by the `<ASSERT>` keyword. A [`Template`] parses the template and
//! the constraints once; [`Template::formula`] then splices in the assertions
//! for any selection of constraints.

use lazy_regex::regex_captures;
use smtlib::sexp::{self, app, atom_s, Sexp};

use crate::{dataset::Instance, error::EvalError};

/// Keyword standing for the assertions in a formula template.
pub const PLACEHOLDER: &str = "<ASSERT>";

/// Logic used when the template does not set one.
pub const DEFAULT_LOGIC: &str = "QF_SLIA";

/// Commands that the verifier issues itself and which are dropped from
/// templates.
const DRIVER_COMMANDS: &[&str] = &[
    "check-sat",
    "check-sat-assuming",
    "get-model",
    "get-unsat-core",
    "get-value",
    "get-info",
    "echo",
    "exit",
];

/// Whether assertions are named so that they can show up in an unsat core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Naming {
    /// Plain `(assert body)`
    Anonymous,
    /// `(assert (! body :named c_<i>))`
    Tracked,
}

/// Name of constraint `i` in an unsat core.
pub fn core_name(i: usize) -> String {
    format!("c_{i}")
}

/// Inverse of [`core_name`].
pub fn core_index(name: &str) -> Option<usize> {
    let (_, i) = regex_captures!(r"^c_(\d+)$", name)?;
    i.parse().ok()
}

/// A single SMT-LIB query: the commands to send before `(check-sat)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    selection: Vec<usize>,
    commands: Vec<Sexp>,
}

impl Formula {
    /// Indices of the constraints asserted by this formula.
    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    /// The commands making up the query.
    pub fn commands(&self) -> &[Sexp] {
        &self.commands
    }
}

/// A parsed instance, ready to produce formulas.
#[derive(Debug, Clone)]
pub struct Template {
    index: usize,
    script: Vec<Sexp>,
    bodies: Vec<Sexp>,
}

/// Strip an optional `(assert ..)` wrapper from a constraint.
fn assertion_body(e: Sexp) -> Sexp {
    if let Some(("assert", [body])) = e.app() {
        return body.clone();
    }
    e
}

impl Template {
    /// Parse instance number `index`, adding `(set-logic default_logic)` if
    /// the template does not set a logic.
    pub fn new(index: usize, instance: &Instance, default_logic: &str) -> Result<Self, EvalError> {
        let parse_error = |what: String| {
            move |err: sexp::ParseError| EvalError::Parse {
                index,
                what,
                msg: err.to_string(),
            }
        };
        let bodies = instance
            .smt2_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| {
                sexp::parse(c)
                    .map(assertion_body)
                    .map_err(parse_error(format!("constraint {i}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut script: Vec<Sexp> = sexp::parse_many(&instance.smt2_formula_placeholder)
            .map_err(parse_error("formula template".to_string()))?
            .into_iter()
            .filter(|e| {
                !matches!(e, Sexp::Comment(_))
                    && !DRIVER_COMMANDS.iter().any(|cmd| e.is_app(cmd))
            })
            .collect();
        if !script.iter().any(|e| e.atom_s() == Some(PLACEHOLDER)) {
            return Err(EvalError::MissingPlaceholder {
                index,
                placeholder: PLACEHOLDER,
            });
        }
        if !script.iter().any(|e| e.is_app("set-logic")) {
            // options such as :produce-unsat-cores must come before the logic
            let pos = script
                .iter()
                .position(|e| !(e.is_app("set-option") || e.is_app("set-info")))
                .unwrap_or(script.len());
            script.insert(pos, app("set-logic", [atom_s(default_logic)]));
        }
        Ok(Self {
            index,
            script,
            bodies,
        })
    }

    /// Number of constraints in the instance.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the instance has no constraints.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Every constraint index, in order.
    pub fn all(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    fn assertion(&self, i: usize, naming: Naming) -> Sexp {
        let body = self.bodies[i].clone();
        match naming {
            Naming::Anonymous => app("assert", [body]),
            Naming::Tracked => app(
                "assert",
                [app("!", [body, atom_s(":named"), atom_s(core_name(i))])],
            ),
        }
    }

    /// Build the query asserting exactly the constraints in `selection`.
    pub fn formula(&self, selection: &[usize], naming: Naming) -> Result<Formula, EvalError> {
        if let Some(&constraint) = selection.iter().find(|&&i| i >= self.len()) {
            return Err(EvalError::NoSuchConstraint {
                index: self.index,
                constraint,
            });
        }
        let mut commands = vec![];
        for e in &self.script {
            if e.atom_s() == Some(PLACEHOLDER) {
                commands.extend(selection.iter().map(|&i| self.assertion(i, naming)));
            } else {
                commands.push(e.clone());
            }
        }
        Ok(Formula {
            selection: selection.to_vec(),
            commands,
        })
    }
}

/// Map constraints given as text (for example, copied from a model's answer)
/// back to their indices in `instance`.
///
/// Each text matches the first occurrence not already matched, so duplicated
/// constraints can be selected more than once.
pub fn select_by_text<S: AsRef<str>>(
    index: usize,
    instance: &Instance,
    texts: &[S],
) -> Result<Vec<usize>, EvalError> {
    let mut used = vec![false; instance.constraints.len()];
    let mut selection = vec![];
    for text in texts {
        let text = text.as_ref().trim();
        let found = instance
            .constraints
            .iter()
            .enumerate()
            .find(|(i, c)| !used[*i] && c.trim() == text)
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                selection.push(i);
            }
            None => {
                return Err(EvalError::UnknownConstraint {
                    index,
                    text: text.to_string(),
                })
            }
        }
    }
    selection.sort_unstable();
    Ok(selection)
}
