// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tilld lifecycle management: spawn, detect, stop.
//!
//! tilld is spawned as a background process and answers on the Unix socket
//! under the state directory. These calls use blocking I/O with short
//! timeouts; they run outside the sync engine's runtime.

use std::fs;
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use till_ipc::{framing, SyncRequest, SyncResponse};
use tillsync::StatePaths;

use crate::error::{Error, Result};

/// Timeout for PING and SHUTDOWN exchanges.
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Information about a running tilld.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonInfo {
    pub pid: u32,
}

/// Send one request over a fresh connection and read the reply.
fn exchange(socket: &Path, request: &SyncRequest) -> std::io::Result<SyncResponse> {
    let mut stream = UnixStream::connect(socket)?;
    stream.set_read_timeout(Some(PING_TIMEOUT))?;
    stream.set_write_timeout(Some(PING_TIMEOUT))?;
    framing::write_message(&mut stream, request)?;
    framing::read_message(&mut stream)
}

/// Detect a running tilld for `paths`.
///
/// Returns `None` if nothing answers PING, cleaning up stale PID and socket
/// files on the way.
pub fn detect_daemon(paths: &StatePaths) -> Option<DaemonInfo> {
    if !paths.socket.exists() {
        if paths.pid.exists() {
            let _ = fs::remove_file(&paths.pid);
        }
        return None;
    }

    match exchange(&paths.socket, &SyncRequest::Ping) {
        // PID file missing means tilld is still starting up
        Ok(SyncResponse::Pong) => read_pid_file(&paths.pid).map(|pid| DaemonInfo { pid }),
        _ => {
            cleanup_stale_files(paths);
            None
        }
    }
}

/// Find the tilld binary.
fn find_daemon_binary() -> PathBuf {
    if let Some(path) = tillsync::env::daemon_binary() {
        return path;
    }
    if let Ok(exe) = std::env::current_exe() {
        let tilld = exe.with_file_name("tilld");
        if tilld.exists() {
            return tilld;
        }
    }
    PathBuf::from("tilld")
}

/// Spawn tilld for `paths` unless one is already running.
pub fn spawn_daemon(paths: &StatePaths, config: Option<&Path>) -> Result<DaemonInfo> {
    if let Some(info) = detect_daemon(paths) {
        return Ok(info);
    }
    fs::create_dir_all(&paths.dir)?;

    let binary = find_daemon_binary();
    let mut command = Command::new(&binary);
    command.arg("--state-dir").arg(&paths.dir);
    if let Some(config) = config {
        command.arg("--config").arg(config);
    }
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Daemon(format!("failed to start {}: {}", binary.display(), e)))?;

    // tilld prints READY once its socket is bound
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) if line == "READY" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    for _ in 0..150 {
        if let Ok(Some(status)) = child.try_wait() {
            let mut stderr_output = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                use std::io::Read;
                let _ = stderr.read_to_string(&mut stderr_output);
            }
            return Err(Error::Daemon(format!(
                "tilld exited with status: {}\n{}",
                status,
                stderr_output.trim()
            )));
        }
        if let Some(info) = detect_daemon(paths) {
            return Ok(info);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    Err(Error::Daemon(
        "tilld failed to start: could not connect after multiple attempts".to_string(),
    ))
}

/// Ask tilld to shut down, killing it if it does not acknowledge.
pub fn stop_daemon(paths: &StatePaths) -> Result<()> {
    let pid = read_pid_file(&paths.pid);

    match exchange(&paths.socket, &SyncRequest::Shutdown) {
        Ok(SyncResponse::ShuttingDown) => {
            if let Some(pid) = pid {
                wait_for_process_exit(pid, Duration::from_secs(6));
            }
        }
        other => {
            tracing::warn!("graceful shutdown failed: {:?}", other);
            if let Some(pid) = pid {
                let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    cleanup_stale_files(paths);
    Ok(())
}

fn cleanup_stale_files(paths: &StatePaths) {
    let _ = fs::remove_file(&paths.socket);
    let _ = fs::remove_file(&paths.pid);
}

fn read_pid_file(pid_path: &Path) -> Option<u32> {
    fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|pid| *pid > 0)
}

fn wait_for_process_exit(pid: u32, timeout: Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        match Command::new("kill").arg("-0").arg(pid.to_string()).output() {
            Ok(output) if !output.status.success() => return,
            Err(_) => return,
            _ => {}
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
