// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.

use std::path::PathBuf;

/// Environment variable names read by till.
pub mod names {
    /// Override the till state directory.
    pub const TILL_STATE_DIR: &str = "TILL_STATE_DIR";

    /// XDG base directory for state data.
    pub const XDG_STATE_HOME: &str = "XDG_STATE_HOME";

    /// Path to the tilld binary started by `till daemon start`.
    pub const TILL_DAEMON_BINARY: &str = "TILL_DAEMON_BINARY";

    /// Log level filtering (read by tracing-subscriber).
    pub const RUST_LOG: &str = "RUST_LOG";
}

/// Returns the value of `TILL_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(names::TILL_STATE_DIR)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(names::XDG_STATE_HOME)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns the value of `TILL_DAEMON_BINARY` if set.
pub fn daemon_binary() -> Option<PathBuf> {
    std::env::var(names::TILL_DAEMON_BINARY)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
