// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Locating solver binaries.

use std::{
    env,
    path::{Path, PathBuf},
};

/// Directory searched for bundled solvers: `solvers/` next to the workspace
/// crates.
fn bundled_solvers_dir() -> Option<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(|root| root.join("solvers"))
}

fn exe_name(bin: &str) -> String {
    if cfg!(windows) && !bin.ends_with(".exe") {
        format!("{bin}.exe")
    } else {
        bin.to_string()
    }
}

/// Get the invocation for the solver called `bin`.
///
/// In order of priority: the `<BIN>_BIN` environment variable (eg,
/// `CVC5_BIN`), a bundled binary under `solvers/`, and finally `bin` itself,
/// to be looked up in `$PATH`.
pub fn solver_path(bin: &str) -> String {
    if let Some(val) = env::var_os(format!("{}_BIN", bin.to_uppercase())) {
        return val.to_string_lossy().into();
    }
    let bin = exe_name(bin);
    match bundled_solvers_dir().map(|dir| dir.join(&bin)) {
        Some(bundled) if bundled.exists() => bundled.to_string_lossy().into(),
        _ => bin,
    }
}

#[cfg(test)]
mod tests {
    use super::solver_path;

    #[test]
    fn test_unknown_solver_falls_back_to_name() {
        let path = solver_path("no-such-solver-xyz");
        assert!(path.ends_with("no-such-solver-xyz") || path.ends_with("no-such-solver-xyz.exe"));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("OVERRIDDEN-SOLVER_BIN", "/opt/bin/overridden");
        assert_eq!(solver_path("overridden-solver"), "/opt/bin/overridden");
    }
}
