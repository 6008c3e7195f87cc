// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Record the SMT-LIB sent to a solver and save it to a file for debugging
//! purposes.

use std::{
    collections::hash_map::DefaultHasher,
    fs::{self, OpenOptions},
    hash::{Hash, Hasher},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::sexp::Sexp;

/// Track and save SMT sent to solver so far.
#[derive(Debug)]
pub struct Tee {
    dir: PathBuf,
    contents: Vec<Sexp>,
}

fn calculate_hash<T: Hash>(v: T) -> String {
    let mut hash_state = DefaultHasher::new();
    v.hash(&mut hash_state);
    let h = hash_state.finish();
    format!("{h:016x}")[..8].to_string()
}

impl Tee {
    /// Create a new empty `Tee` that saves into `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            contents: vec![],
        }
    }

    /// Append a raw s-expression sent to solver.
    pub fn append(&mut self, s: Sexp) {
        self.contents.push(s)
    }

    fn render(&self) -> String {
        self.contents
            .iter()
            .map(|s| match s {
                Sexp::Comment(c) if c.is_empty() => "".to_string(),
                Sexp::Comment(c) => format!(";; {c}"),
                _ => s.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Save the SMT2 input currently sent to the solver to a file named after
    /// its content hash, creating the directory if needed. Returns the path
    /// of the saved file.
    pub fn save(&self) -> io::Result<PathBuf> {
        let contents = self.render();
        let hash = calculate_hash(&contents);
        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(format!("query-{hash}.smt2"));
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&dest)?;
        writeln!(&mut f, "{contents}")?;
        Ok(dest)
    }
}
