// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tillsync: offline operation queue and sync engine.
//!
//! Components, leaves first:
//! - [`monitor::ConnectionMonitor`]: reachability from platform events and
//!   periodic health probes
//! - [`queue::OperationQueue`]: enqueue, retry, complete and fail queued
//!   operations on top of the durable store
//! - [`executor::SyncExecutor`]: drains the queue one operation at a time
//! - [`background`]: the background context actor answering the
//!   cross-context protocol
//! - [`coordinator::SyncCoordinator`]: the surface used by the rest of the
//!   application

pub mod background;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod executor;
pub mod listeners;
pub mod monitor;
pub mod queue;
pub mod remote;

#[cfg(test)]
mod test_helpers;

pub use background::{BackgroundContext, BackgroundHandle, Envelope};
pub use channel::{ContextChannel, MailboxChannel, SocketChannel};
pub use config::{Config, StatePaths};
pub use coordinator::{ForceSyncResult, StatusUpdate, SyncCoordinator};
pub use error::{Error, Result};
pub use executor::SyncExecutor;
pub use listeners::{Listeners, Subscription};
pub use monitor::{ConnectionMonitor, HttpProbe, NetworkEvent, Probe};
pub use queue::OperationQueue;
pub use remote::{ApplyError, HttpRemote, RemoteApply};
