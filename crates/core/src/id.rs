// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Per-process counter mixed into every id so that operations enqueued in
/// the same instant still hash differently.
static NONCE: AtomicU64 = AtomicU64::new(0);

/// Generate an operation ID from entity kind and enqueue timestamp.
/// Format: op-{hash} where hash is the first 16 hex chars of
/// SHA256(kind + timestamp + pid + nonce)
pub fn generate_op_id(entity_kind: &str, enqueued_at: &DateTime<Utc>) -> String {
    let nonce = NONCE.fetch_add(1, Ordering::Relaxed);
    let input = format!(
        "{}{}{}{}",
        entity_kind,
        enqueued_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        std::process::id(),
        nonce
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("op-{}", hex::encode(&hash[..8]))
}

/// Generate an operation ID that `exists` does not report as taken.
pub fn generate_unique_op_id<F>(
    entity_kind: &str,
    enqueued_at: &DateTime<Utc>,
    exists: F,
) -> String
where
    F: Fn(&str) -> bool,
{
    loop {
        let id = generate_op_id(entity_kind, enqueued_at);
        if !exists(&id) {
            return id;
        }
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
