// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the sync engine.
///
/// Remote apply outcomes are not represented here: a transient or permanent
/// rejection is a value the drain loop acts on (see
/// [`ApplyError`](crate::remote::ApplyError)), not a failure of the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] till_core::Error),

    #[error("offline: sync needs connectivity\n  hint: queued operations are kept and replayed once the terminal is back online")]
    Offline,

    #[error("a drain is already in progress")]
    DrainInProgress,

    #[error("{request} timed out after {}s\n  hint: the background context may have been stopped or evicted", after.as_secs())]
    ContextTimeout {
        request: &'static str,
        after: Duration,
    },

    #[error("background context unavailable: {0}\n  hint: start it with 'tilld' or run the command without the daemon")]
    ContextUnavailable(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
