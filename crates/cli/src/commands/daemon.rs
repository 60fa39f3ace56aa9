// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Commands for controlling tilld.

use std::io::Write;
use std::path::Path;

use tillsync::StatePaths;

use crate::cli::DaemonCommand;
use crate::daemon;
use crate::error::Result;

pub fn run(
    command: DaemonCommand,
    paths: &StatePaths,
    config: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        DaemonCommand::Status => match daemon::detect_daemon(paths) {
            Some(info) => {
                writeln!(out, "Status: running")?;
                writeln!(out, "PID: {}", info.pid)?;
                writeln!(out, "Socket: {}", paths.socket.display())?;
            }
            None => writeln!(out, "Status: not running")?,
        },
        DaemonCommand::Start => match daemon::detect_daemon(paths) {
            Some(info) => writeln!(out, "tilld is already running (PID: {})", info.pid)?,
            None => {
                let info = daemon::spawn_daemon(paths, config)?;
                writeln!(out, "tilld started (PID: {})", info.pid)?;
            }
        },
        DaemonCommand::Stop => {
            if daemon::detect_daemon(paths).is_none() {
                writeln!(out, "tilld is not running.")?;
            } else {
                daemon::stop_daemon(paths)?;
                writeln!(out, "tilld stopped.")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
