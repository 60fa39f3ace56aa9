// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for till-core operations.

use thiserror::Error;

/// All possible errors that can occur in till-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("invalid operation type: '{0}'\n  hint: valid types are: create, update, delete")]
    InvalidOpType(String),

    #[error("invalid operation state: '{0}'\n  hint: valid states are: pending, failed")]
    InvalidOpState(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// A specialized Result type for till-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
