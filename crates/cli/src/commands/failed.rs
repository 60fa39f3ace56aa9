// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Commands over operations that left automatic replay.

use std::io::Write;

use till_core::PendingOperation;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::session::Session;

use super::print_json;

pub async fn list(session: &Session, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    let failed = session.coordinator().failed().await?;
    match output {
        OutputFormat::Json => print_json(out, &failed),
        OutputFormat::Text if failed.is_empty() => {
            writeln!(out, "No failed operations")?;
            Ok(())
        }
        OutputFormat::Text => {
            for op in &failed {
                writeln!(out, "{}", format_operation(op))?;
            }
            Ok(())
        }
    }
}

pub async fn resubmit(session: &Session, ids: &[String], out: &mut impl Write) -> Result<()> {
    for id in ids {
        session.coordinator().resubmit(id).await?;
        writeln!(out, "Resubmitted {}", id)?;
    }
    writeln!(out, "Run 'till sync' to replay now")?;
    Ok(())
}

pub async fn discard(session: &Session, ids: &[String], out: &mut impl Write) -> Result<()> {
    for id in ids {
        session.coordinator().discard(id).await?;
        writeln!(out, "Discarded {}", id)?;
    }
    Ok(())
}

/// One line per operation: id, type, entity, retries and enqueue time.
pub(crate) fn format_operation(op: &PendingOperation) -> String {
    let entity = match op.entity_id() {
        Some(id) => format!("{}/{}", op.entity_kind, id),
        None => op.entity_kind.clone(),
    };
    format!(
        "{}  {:<6} {}  retries: {}  {}",
        op.id,
        op.op_type.as_str(),
        entity,
        op.retry_count,
        op.enqueued_at.format("%Y-%m-%d %H:%M")
    )
}

#[cfg(test)]
#[path = "failed_tests.rs"]
mod tests;
