// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures for command tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use till_core::{ConnectionStatus, OperationStore, PendingOperation, SqliteStore};
use tillsync::monitor::ProbeResult;
use tillsync::remote::ApplyResult;
use tillsync::{
    ApplyError, BackgroundContext, BackgroundHandle, Config, MailboxChannel, Probe, RemoteApply,
    SyncCoordinator,
};

use crate::session::{Backend, Session};

/// Remote that accepts everything except the entity kinds it was told to reject.
#[derive(Default)]
pub struct StubRemote {
    calls: Mutex<Vec<String>>,
    reject: Mutex<HashSet<String>>,
}

impl StubRemote {
    pub fn reject_kind(&self, kind: &str) {
        self.reject.lock().unwrap().insert(kind.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RemoteApply for StubRemote {
    fn apply<'a>(
        &'a self,
        op: &'a PendingOperation,
    ) -> Pin<Box<dyn Future<Output = ApplyResult> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(op.id.clone());
            if self.reject.lock().unwrap().contains(&op.entity_kind) {
                return Err(ApplyError::Permanent("422 Unprocessable Entity".to_string()));
            }
            Ok(())
        })
    }
}

pub struct StubProbe(pub bool);

impl Probe for StubProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>> {
        let reachable = self.0;
        Box::pin(async move {
            if reachable {
                Ok(Duration::from_millis(8))
            } else {
                Err("unreachable".to_string())
            }
        })
    }
}

pub struct TestContext {
    pub session: Session,
    pub remote: Arc<StubRemote>,
    pub store: Arc<dyn OperationStore>,
    pub background: BackgroundHandle,
}

impl TestContext {
    /// Online session whose background context runs in this process.
    pub fn new() -> Self {
        Self::build(true, Backend::InProcess)
    }

    pub fn offline() -> Self {
        Self::build(false, Backend::InProcess)
    }

    /// Online session that reports itself as talking to tilld.
    pub fn daemon() -> Self {
        Self::build(true, Backend::Daemon)
    }

    fn build(online: bool, backend: Backend) -> Self {
        let config = Config::default();
        let store: Arc<dyn OperationStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let remote = Arc::new(StubRemote::default());
        let probe = Arc::new(StubProbe(online));
        let initial = if online {
            ConnectionStatus::online()
        } else {
            ConnectionStatus::offline()
        };

        let background = BackgroundContext::new(
            &config,
            Arc::clone(&store),
            remote.clone(),
            probe.clone(),
            initial.clone(),
        )
        .spawn();
        let coordinator = SyncCoordinator::from_config(
            &config,
            Arc::clone(&store),
            remote.clone(),
            probe,
            Arc::new(MailboxChannel::new(background.clone())),
            initial,
        );
        TestContext {
            session: Session::from_parts(coordinator, Some(background.clone()), backend),
            remote,
            store,
            background,
        }
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}
