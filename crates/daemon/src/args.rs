// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command line for `tilld`.

use std::path::PathBuf;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DaemonArgs {
    /// `--state-dir <path>`: overrides every other state directory source.
    pub state_dir: Option<PathBuf>,
    /// `--config <path>`: config file to load instead of the default.
    pub config: Option<PathBuf>,
}

impl DaemonArgs {
    /// Parse `args` as passed to the process, program name included.
    ///
    /// Unknown flags are ignored; a flag without a value is treated as unset.
    pub fn parse(args: &[String]) -> Self {
        let mut parsed = DaemonArgs::default();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--state-dir" => parsed.state_dir = iter.next().map(PathBuf::from),
                "--config" => parsed.config = iter.next().map(PathBuf::from),
                other => {
                    if let Some(dir) = other.strip_prefix("--state-dir=") {
                        parsed.state_dir = Some(PathBuf::from(dir));
                    } else if let Some(path) = other.strip_prefix("--config=") {
                        parsed.config = Some(PathBuf::from(path));
                    }
                }
            }
        }
        parsed
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
