// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use till_ipc::PassSummary;

use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::session::Session;

use super::print_json;

/// Drain now, in the background context or with `local` in this process.
pub async fn run(
    session: &Session,
    local: bool,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let coordinator = session.coordinator();
    let summary = if local {
        coordinator.drain_here().await?
    } else {
        let result = coordinator.force_sync().await;
        match (result.success, result.summary) {
            (true, Some(summary)) => summary,
            _ => {
                return Err(Error::SyncFailed(
                    result.error.unwrap_or_else(|| "no summary".to_string()),
                ))
            }
        }
    };

    match output {
        OutputFormat::Text => print_text(&summary, out),
        OutputFormat::Json => print_json(out, &summary),
    }
}

fn print_text(summary: &PassSummary, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{}", summary)?;
    if summary.failed > 0 {
        writeln!(
            out,
            "{} operation(s) will not be retried; see 'till failed'",
            summary.failed
        )?;
    }
    if summary.retried > 0 || summary.deferred > 0 {
        writeln!(out, "Remaining operations are kept for the next sync")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
