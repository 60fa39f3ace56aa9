// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Config pointing at a port nothing listens on, so every probe fails fast.
const OFFLINE_CONFIG: &str = r#"
[remote]
base_url = "http://127.0.0.1:9"
request_timeout_secs = 1

[probe]
timeout_secs = 1
"#;

/// A state directory and config file for one test.
pub struct Terminal {
    pub temp: TempDir,
}

impl Terminal {
    pub fn offline() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("till.toml"), OFFLINE_CONFIG).unwrap();
        Terminal { temp }
    }

    /// `till` bound to this terminal's config and state directory.
    pub fn till(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("till");
        cmd.arg("--config")
            .arg(self.temp.path().join("till.toml"))
            .arg("--state-dir")
            .arg(self.temp.path().join("state"))
            .env_remove("TILL_STATE_DIR")
            .env("RUST_LOG", "error");
        cmd
    }

    /// Enqueue and return the operation id.
    pub fn enqueue(&self, op_type: &str, kind: &str, payload: &str) -> String {
        let output = self
            .till()
            .args(["enqueue", op_type, kind, payload])
            .output()
            .unwrap();
        assert!(output.status.success(), "{:?}", output);
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }
}
