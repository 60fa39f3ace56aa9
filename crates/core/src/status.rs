// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Derived and ephemeral status types reported to the rest of the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the table whose sync progress is tracked in [`SyncMetadata`].
pub const OPERATIONS_TABLE: &str = "pending_operations";

/// Counters derived from the queue. Never persisted as a whole.
///
/// `total_operations` always equals the sum of the other three counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_operations: u64,
    /// Operations still eligible for automatic replay.
    pub pending_operations: u64,
    /// Operations in the Failed state or out of retries.
    pub failed_operations: u64,
    /// Operations acknowledged by the remote and removed from the queue.
    pub completed_operations: u64,
}

impl QueueStats {
    /// Build stats from the three independent counters.
    pub fn new(pending: u64, failed: u64, completed: u64) -> Self {
        QueueStats {
            total_operations: pending + failed + completed,
            pending_operations: pending,
            failed_operations: failed,
            completed_operations: completed,
        }
    }

    /// Whether anything is still waiting for replay.
    pub fn has_pending(&self) -> bool {
        self.pending_operations > 0
    }
}

/// Reachability as last observed by the connection monitor.
///
/// Recomputed on every platform transition and every probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub is_online: bool,
    /// Physical link, e.g. "wifi", "ethernet", "cellular".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// Effective link quality, e.g. "4g", "3g".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,
    /// Estimated downlink in Mbit/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downlink: Option<f64>,
    /// Round-trip time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt: Option<u64>,
}

impl ConnectionStatus {
    /// A bare online status with no link details.
    pub fn online() -> Self {
        ConnectionStatus {
            is_online: true,
            ..Default::default()
        }
    }

    /// A bare offline status with no link details.
    pub fn offline() -> Self {
        ConnectionStatus::default()
    }
}

/// Progress marker for the operations table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub table_name: String,
    /// When a pass last finished without a transient failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Incremented on every recorded sync.
    pub sync_version: u64,
}

impl Default for SyncMetadata {
    fn default() -> Self {
        SyncMetadata {
            table_name: OPERATIONS_TABLE.to_string(),
            last_sync_at: None,
            sync_version: 0,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
