// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine wiring for one CLI invocation.
//!
//! Commands talk to `tilld` when its socket answers PING. Otherwise a
//! background context is started inside this process for the duration of
//! the command, over the same store file.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use till_core::{ConnectionStatus, OperationStore, SqliteStore};
use tillsync::{
    BackgroundContext, BackgroundHandle, Config, ContextChannel, HttpProbe, HttpRemote,
    MailboxChannel, Probe, RemoteApply, SocketChannel, StatePaths, SyncCoordinator,
};

use crate::error::Result;

/// How long to wait for tilld to answer PING before going in-process.
const DAEMON_PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Where the background context for this invocation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Daemon,
    InProcess,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Daemon => write!(f, "tilld"),
            Backend::InProcess => write!(f, "in-process"),
        }
    }
}

pub struct Session {
    coordinator: SyncCoordinator,
    background: Option<BackgroundHandle>,
    backend: Backend,
}

impl Session {
    /// Open the store and connect to a background context.
    ///
    /// With `probe` set, reachability is checked before returning so that
    /// sync commands do not start from the initial offline state. Without it
    /// an in-process background context runs no probe at all, so enqueue
    /// and list commands never touch the network.
    pub async fn open(config: &Config, paths: &StatePaths, probe: bool) -> Result<Session> {
        let store: Arc<dyn OperationStore> = Arc::new(SqliteStore::open(&paths.store)?);
        let remote: Arc<dyn RemoteApply> = Arc::new(HttpRemote::new(&config.remote)?);
        let prober: Arc<dyn Probe> = Arc::new(HttpProbe::new(config)?);
        let initial = ConnectionStatus::offline();

        let socket = SocketChannel::new(paths.socket.clone());
        let (channel, background, backend) = if socket.is_alive(DAEMON_PING_TIMEOUT).await {
            let channel: Arc<dyn ContextChannel> = Arc::new(socket);
            (channel, None, Backend::Daemon)
        } else {
            tracing::debug!("tilld not answering on {}", paths.socket.display());
            let context = BackgroundContext::new(
                config,
                Arc::clone(&store),
                Arc::clone(&remote),
                Arc::clone(&prober),
                initial.clone(),
            );
            let handle = if probe {
                context.monitor().probe_now().await;
                context.spawn()
            } else {
                context.without_probing().spawn()
            };
            let channel: Arc<dyn ContextChannel> = Arc::new(MailboxChannel::new(handle.clone()));
            (channel, Some(handle), Backend::InProcess)
        };

        let coordinator =
            SyncCoordinator::from_config(config, store, remote, prober, channel, initial);
        if probe {
            coordinator.refresh_connection().await;
        }
        Ok(Session::from_parts(coordinator, background, backend))
    }

    pub fn from_parts(
        coordinator: SyncCoordinator,
        background: Option<BackgroundHandle>,
        backend: Backend,
    ) -> Session {
        Session {
            coordinator,
            background,
            backend,
        }
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Stop the coordinator and any in-process background context.
    pub async fn close(self) {
        self.coordinator.shutdown();
        if let Some(handle) = self.background {
            handle.shutdown();
            handle.join().await;
        }
    }
}
