// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-context protocol for the till sync engine.
//!
//! The foreground context (an open terminal session or the `till` CLI) and
//! the background context (the `tilld` daemon, or an in-process actor) share
//! nothing but the operation store. Everything else crosses the boundary as
//! one of the messages below, serialized as JSON with length-prefixed framing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error returned by `FromStr` impls for protocol types.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// Invalid execution context string.
    InvalidContext(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidContext(s) => write!(f, "invalid execution context: '{}'", s),
        }
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// Model types
// ============================================================================

/// Which execution context ran a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Bound to the open UI session.
    Foreground,
    /// Survives the UI; hosted by the daemon or a long-lived task.
    Background,
}

impl ExecutionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionContext::Foreground => "foreground",
            ExecutionContext::Background => "background",
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExecutionContext {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "foreground" => Ok(ExecutionContext::Foreground),
            "background" => Ok(ExecutionContext::Background),
            _ => Err(ParseError::InvalidContext(s.to_string())),
        }
    }
}

/// Outcome of one drain pass.
///
/// `attempted` counts operations whose remote call was issued; deferred
/// operations were skipped because an earlier operation on the same entity
/// failed transiently in the same pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub attempted: u32,
    pub completed: u32,
    pub retried: u32,
    pub failed: u32,
    pub deferred: u32,
    /// Operations left untouched because the store rejected a write.
    #[serde(default)]
    pub store_errors: u32,
    /// Operations applied here that another context had already completed.
    #[serde(default)]
    pub skipped: u32,
    pub context: ExecutionContext,
    pub finished_at: DateTime<Utc>,
}

impl PassSummary {
    /// An empty summary for a pass run in `context`.
    pub fn empty(context: ExecutionContext) -> Self {
        PassSummary {
            attempted: 0,
            completed: 0,
            retried: 0,
            failed: 0,
            deferred: 0,
            store_errors: 0,
            skipped: 0,
            context,
            finished_at: Utc::now(),
        }
    }

    /// Whether the pass left nothing to retry.
    ///
    /// A clean pass with at least one attempt advances the sync metadata.
    pub fn is_clean(&self) -> bool {
        self.retried == 0 && self.deferred == 0 && self.store_errors == 0
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pass: {} attempted, {} completed, {} retried, {} failed, {} deferred",
            self.context, self.attempted, self.completed, self.retried, self.failed, self.deferred
        )
    }
}

/// Read-only snapshot answered to `GET_SYNC_STATUS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub pending_operations: u64,
    #[serde(default)]
    pub failed_operations: u64,
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusSnapshot {
    /// Safe default used when the background context does not answer in time.
    pub fn fallback(is_online: bool, error: impl Into<String>) -> Self {
        StatusSnapshot {
            pending_operations: 0,
            failed_operations: 0,
            is_online,
            last_sync: None,
            error: Some(error.into()),
        }
    }
}

/// Notification pushed from the background context to foreground subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A drain pass finished.
    PassCompleted(PassSummary),
    /// The background context observed a reachability change.
    ConnectivityChanged { is_online: bool },
}

// ============================================================================
// Protocol types
// ============================================================================

/// Request sent to the background context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncRequest {
    /// Register for background draining under `tag`.
    RegisterSync { tag: String },
    /// Run a drain now and answer when that drain completes.
    ForceSync,
    /// Read-only status snapshot.
    GetSyncStatus,
    /// Keep the connection open and stream [`SyncEvent`]s.
    WatchEvents,
    /// Ping to check if the context is alive.
    Ping,
    /// Graceful shutdown.
    Shutdown,
    /// Version handshake request.
    Hello { version: String },
}

impl SyncRequest {
    /// Wire name of the request, used in timeout messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            SyncRequest::RegisterSync { .. } => "REGISTER_SYNC",
            SyncRequest::ForceSync => "FORCE_SYNC",
            SyncRequest::GetSyncStatus => "GET_SYNC_STATUS",
            SyncRequest::WatchEvents => "WATCH_EVENTS",
            SyncRequest::Ping => "PING",
            SyncRequest::Shutdown => "SHUTDOWN",
            SyncRequest::Hello { .. } => "HELLO",
        }
    }
}

/// Response delivered on the reply channel of the originating request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncResponse {
    /// Registration recorded; `tags` lists every active registration.
    Registered { tags: Vec<String> },
    /// The forced drain finished.
    SyncComplete(PassSummary),
    /// The forced drain could not run.
    SyncFailed { error: String },
    /// Status snapshot.
    SyncStatus(StatusSnapshot),
    /// Streamed event (only after `WATCH_EVENTS`).
    Event { event: SyncEvent },
    /// Pong response.
    Pong,
    /// Shutdown acknowledged.
    ShuttingDown,
    /// Version handshake response.
    Hello { version: String },
    /// Error response.
    Error { message: String },
}

// ============================================================================
// Message framing
// ============================================================================

/// Maximum message size (1MB) to prevent malformed messages from causing hangs.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn too_large(len: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("message too large: {} bytes (max {})", len, MAX_MESSAGE_SIZE),
    )
}

fn encode<T: Serialize>(message: &T) -> std::io::Result<(u32, Vec<u8>)> {
    let json = serde_json::to_vec(message)
        .map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(too_large(json.len()));
    }
    let len = u32::try_from(json.len()).map_err(|_| std::io::Error::other("message too large"))?;
    Ok((len, json))
}

fn decode<T: serde::de::DeserializeOwned>(buf: &[u8]) -> std::io::Result<T> {
    serde_json::from_slice(buf).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("deserialize error: {}", e),
        )
    })
}

/// Blocking message framing.
///
/// Messages are framed as:
/// - 4 bytes: message length (big-endian u32)
/// - N bytes: JSON-encoded message
pub mod framing {
    use std::io::{Read, Write};

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use super::{decode, encode, too_large, MAX_MESSAGE_SIZE};

    /// Write a serializable message to the given writer.
    pub fn write_message<W: Write, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        let (len, json) = encode(message)?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&json)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a deserializable message from the given reader.
    pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE {
            return Err(too_large(len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        decode(&buf)
    }
}

/// Async message framing over tokio streams. Same wire format as [`framing`].
pub mod framing_async {
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::{decode, encode, too_large, MAX_MESSAGE_SIZE};

    /// Write a serializable message to the given writer.
    pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        let (len, json) = encode(message)?;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&json).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read a deserializable message from the given reader.
    pub async fn read_message<R: AsyncRead + Unpin, T: DeserializeOwned>(
        reader: &mut R,
    ) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE {
            return Err(too_large(len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        decode(&buf)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
