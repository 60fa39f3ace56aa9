// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors reported by the `till` command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid payload: {0}\n  hint: pass a JSON object, e.g. '{{\"id\":\"s1\",\"total\":12}}'")]
    InvalidPayload(String),

    #[error("{op_type} needs an \"id\" field in the payload\n  hint: only create may omit the id")]
    MissingEntityId { op_type: till_core::OpType },

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("{0}")]
    Daemon(String),

    #[error(transparent)]
    Sync(#[from] tillsync::Error),

    #[error(transparent)]
    Store(#[from] till_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
