// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use serde_json::{json, Value};
use till_core::OpType;

use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::session::Session;

use super::print_json;

pub async fn run(
    session: &Session,
    op_type: OpType,
    kind: &str,
    payload: &str,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let payload = parse_payload(op_type, payload)?;
    let id = session
        .coordinator()
        .enqueue(op_type, kind.trim(), payload)
        .await?;

    match output {
        OutputFormat::Text => writeln!(out, "{}", id)?,
        OutputFormat::Json => print_json(out, &json!({ "id": id }))?,
    }
    Ok(())
}

/// Parse a command line payload. Update and Delete must name their entity.
pub(crate) fn parse_payload(op_type: OpType, raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::InvalidPayload(e.to_string()))?;
    let Value::Object(fields) = &value else {
        return Err(Error::InvalidPayload("expected a JSON object".to_string()));
    };
    let has_id = match fields.get("id") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if op_type != OpType::Create && !has_id {
        return Err(Error::MissingEntityId { op_type });
    }
    Ok(value)
}

#[cfg(test)]
#[path = "enqueue_tests.rs"]
mod tests;
