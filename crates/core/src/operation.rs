// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued mutations awaiting remote application.
//!
//! A [`PendingOperation`] is recorded the instant a mutation is issued,
//! whether the terminal is online or not, and is deleted only after the
//! remote service acknowledges it. Later mutations on the same entity are
//! recorded as new operations; the payload of a recorded operation never
//! changes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Kind of mutation carried by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl OpType {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Create => "create",
            OpType::Update => "update",
            OpType::Delete => "delete",
        }
    }

    /// Whether the remote call for this type carries the payload as a body.
    pub fn has_body(&self) -> bool {
        !matches!(self, OpType::Delete)
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OpType::Create),
            "update" => Ok(OpType::Update),
            "delete" => Ok(OpType::Delete),
            _ => Err(Error::InvalidOpType(s.to_string())),
        }
    }
}

/// Replay state of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpState {
    /// Eligible for automatic replay.
    #[default]
    Pending,
    /// Permanently rejected or out of retries. Never replayed automatically;
    /// kept until the user resubmits or discards it.
    Failed,
}

impl OpState {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpState::Pending => "pending",
            OpState::Failed => "failed",
        }
    }
}

impl fmt::Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OpState::Pending),
            "failed" => Ok(OpState::Failed),
            _ => Err(Error::InvalidOpState(s.to_string())),
        }
    }
}

/// A queued, not-yet-confirmed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Client-generated unique identifier (format: `op-{hash}`).
    pub id: String,
    /// Kind of mutation.
    #[serde(rename = "type")]
    pub op_type: OpType,
    /// Entity collection the mutation targets (e.g. "products", "sales").
    pub entity_kind: String,
    /// The mutated record, sent as the request body for creates and updates.
    pub payload: Value,
    /// When the mutation was issued.
    pub enqueued_at: DateTime<Utc>,
    /// Number of transient failures seen so far. Never decreases during replay.
    pub retry_count: u32,
    /// Replay state.
    pub state: OpState,
}

impl PendingOperation {
    /// Construct a fresh operation in the `Pending` state with no retries.
    pub fn new(
        id: String,
        op_type: OpType,
        entity_kind: String,
        payload: Value,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        PendingOperation {
            id,
            op_type,
            entity_kind,
            payload,
            enqueued_at,
            retry_count: 0,
            state: OpState::Pending,
        }
    }

    /// The id of the entity this operation mutates, taken from the payload's
    /// `id` field. Numeric ids are rendered in decimal.
    pub fn entity_id(&self) -> Option<String> {
        match self.payload.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Key that groups operations whose relative order must be preserved.
    ///
    /// Operations without an entity id (e.g. a create whose id is assigned
    /// remotely) are keyed by their own id and so never block each other.
    pub fn ordering_key(&self) -> String {
        match self.entity_id() {
            Some(entity_id) => format!("{}/{}", self.entity_kind, entity_id),
            None => format!("{}#{}", self.entity_kind, self.id),
        }
    }

    /// Whether this operation is still eligible for automatic replay.
    pub fn is_replayable(&self, max_retries: u32) -> bool {
        self.state == OpState::Pending && self.retry_count < max_retries
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
