// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use serde::Serialize;
use till_core::{ConnectionStatus, QueueStats};
use till_ipc::StatusSnapshot;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::session::{Backend, Session};

use super::print_json;

#[derive(Debug, Serialize)]
struct StatusReport {
    backend: Backend,
    connection: ConnectionStatus,
    background: StatusSnapshot,
    queue: QueueStats,
}

pub async fn run(session: &Session, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    let coordinator = session.coordinator();
    let report = StatusReport {
        backend: session.backend(),
        connection: coordinator.connection(),
        background: coordinator.get_status().await,
        queue: coordinator.stats().await?,
    };

    match output {
        OutputFormat::Text => print_text(&report, out),
        OutputFormat::Json => print_json(out, &report),
    }
}

fn print_text(report: &StatusReport, out: &mut impl Write) -> Result<()> {
    let connection = match (report.connection.is_online, report.connection.rtt) {
        (true, Some(rtt)) => format!("online (rtt {}ms)", rtt),
        (true, None) => "online".to_string(),
        (false, _) => "offline".to_string(),
    };
    let last_sync = report
        .background
        .last_sync
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    writeln!(out, "Connection: {}", connection)?;
    writeln!(out, "Background: {}", report.backend)?;
    writeln!(out, "Pending: {}", report.background.pending_operations)?;
    writeln!(out, "Failed: {}", report.background.failed_operations)?;
    writeln!(out, "Completed: {}", report.queue.completed_operations)?;
    writeln!(out, "Last sync: {}", last_sync)?;
    if let Some(error) = &report.background.error {
        writeln!(out, "Warning: background status unavailable: {}", error)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
