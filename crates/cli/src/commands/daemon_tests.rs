// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    status = { DaemonCommand::Status, "Status: not running\n" },
    stop = { DaemonCommand::Stop, "tilld is not running.\n" },
)]
fn without_daemon(command: DaemonCommand, expected: &str) {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path().to_path_buf());
    let mut out = Vec::new();

    run(command, &paths, None, &mut out).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), expected);
}
