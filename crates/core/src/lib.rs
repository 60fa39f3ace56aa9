// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! till-core: shared library for the till offline sync engine
//!
//! This crate provides the queued-operation data model, operation id
//! generation and the durable SQLite store shared by the foreground
//! process, the `tilld` background daemon and the `till` CLI.

pub mod error;
pub mod id;
pub mod operation;
pub mod status;
pub mod store;

pub use error::{Error, Result};
pub use id::{generate_op_id, generate_unique_op_id};
pub use operation::{OpState, OpType, PendingOperation};
pub use status::{ConnectionStatus, QueueStats, SyncMetadata};
pub use store::{OperationStore, SqliteStore};
