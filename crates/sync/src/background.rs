// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background context actor.
//!
//! The background context owns its own monitor view, queue and executor over
//! the shared store and is reachable only through its mailbox. Each request
//! carries a oneshot reply channel. Long requests (FORCE_SYNC) run in their
//! own task so the mailbox keeps answering while a drain is in flight.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use till_core::{ConnectionStatus, OperationStore};
use till_ipc::{ExecutionContext, StatusSnapshot, SyncEvent, SyncRequest, SyncResponse};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::SyncExecutor;
use crate::monitor::{ConnectionMonitor, Probe};
use crate::queue::OperationQueue;
use crate::remote::RemoteApply;

const MAILBOX_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 64;

/// A request paired with the channel its answer goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub request: SyncRequest,
    pub reply: oneshot::Sender<SyncResponse>,
}

/// State owned by the background actor task.
pub struct BackgroundContext {
    monitor: Arc<ConnectionMonitor>,
    queue: Arc<OperationQueue>,
    executor: Arc<SyncExecutor>,
    tags: BTreeSet<String>,
    events: broadcast::Sender<SyncEvent>,
    cancel: CancellationToken,
    probing: bool,
}

/// Cloneable address of a running background context.
#[derive(Clone)]
pub struct BackgroundHandle {
    mailbox: mpsc::Sender<Envelope>,
    events: broadcast::Sender<SyncEvent>,
    cancel: CancellationToken,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl BackgroundContext {
    /// Assemble a background context over `store`.
    pub fn new(
        config: &Config,
        store: Arc<dyn OperationStore>,
        remote: Arc<dyn RemoteApply>,
        probe: Arc<dyn Probe>,
        initial: ConnectionStatus,
    ) -> Self {
        let monitor = Arc::new(ConnectionMonitor::from_config(config, probe, initial));
        let trigger = Arc::new(Notify::new());
        let queue = Arc::new(
            OperationQueue::new(store, config.sync.max_retries)
                .with_trigger(Arc::clone(&trigger), monitor.watch()),
        );
        let executor = Arc::new(
            SyncExecutor::new(
                Arc::clone(&queue),
                remote,
                monitor.watch(),
                ExecutionContext::Background,
                trigger,
            )
            .with_lease_ttl(config.lease_ttl()),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        BackgroundContext {
            monitor,
            queue,
            executor,
            tags: BTreeSet::new(),
            events,
            cancel: CancellationToken::new(),
            probing: true,
        }
    }

    /// Do not run the periodic reachability probe. Connectivity then only
    /// changes through explicit probes and network events.
    pub fn without_probing(mut self) -> Self {
        self.probing = false;
        self
    }

    pub fn monitor(&self) -> &Arc<ConnectionMonitor> {
        &self.monitor
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    /// Start probing (unless disabled) and spawn the actor loop.
    pub fn spawn(self) -> BackgroundHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        if self.probing {
            self.monitor.start();
        }
        let task = tokio::spawn(self.run(rx));
        BackgroundHandle {
            mailbox: tx,
            events,
            cancel,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }

    async fn run(mut self, mut mailbox: mpsc::Receiver<Envelope>) {
        let mut online = self.monitor.watch();
        let mut was_online = online.borrow_and_update().is_online;
        let mut passes = self.executor.subscribe_passes();
        tracing::info!("background context started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                envelope = mailbox.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = online.borrow_and_update().is_online;
                    if now_online != was_online {
                        let event = SyncEvent::ConnectivityChanged { is_online: now_online };
                        let _ = self.events.send(event);
                    }
                    if now_online && !was_online && !self.tags.is_empty() {
                        let count = self.tags.len();
                        tracing::info!("back online with {} registration(s); draining", count);
                        self.spawn_drain();
                    }
                    was_online = now_online;
                }
                pass = passes.recv() => match pass {
                    Ok(summary) => {
                        let _ = self.events.send(SyncEvent::PassCompleted(summary));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("dropped {} pass notifications", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        self.monitor.destroy();
        self.queue.clear_listeners();
        tracing::info!("background context stopped");
    }

    fn spawn_drain(&self) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            match executor.drain().await {
                Ok(_) | Err(Error::DrainInProgress) | Err(Error::Offline) => {}
                Err(e) => tracing::warn!("background drain failed: {}", e),
            }
        });
    }

    async fn handle(&mut self, envelope: Envelope) {
        let Envelope { request, reply } = envelope;
        tracing::debug!("background request {}", request.name());
        let response = match request {
            SyncRequest::RegisterSync { tag } => {
                let tag = tag.trim().to_string();
                if tag.is_empty() {
                    SyncResponse::Error {
                        message: "sync tag must not be empty".to_string(),
                    }
                } else {
                    if self.tags.insert(tag.clone()) {
                        tracing::info!("registered background sync '{}'", tag);
                    }
                    if self.monitor.is_online() {
                        self.spawn_drain();
                    }
                    SyncResponse::Registered {
                        tags: self.tags.iter().cloned().collect(),
                    }
                }
            }
            SyncRequest::ForceSync => {
                let executor = Arc::clone(&self.executor);
                tokio::spawn(async move {
                    let response = match executor.drain_when_idle().await {
                        Ok(summary) => SyncResponse::SyncComplete(summary),
                        Err(e) => SyncResponse::SyncFailed {
                            error: e.to_string(),
                        },
                    };
                    let _ = reply.send(response);
                });
                return;
            }
            SyncRequest::GetSyncStatus => SyncResponse::SyncStatus(self.snapshot().await),
            SyncRequest::WatchEvents => SyncResponse::Error {
                message: "WATCH_EVENTS is served by the socket listener".to_string(),
            },
            SyncRequest::Ping => SyncResponse::Pong,
            SyncRequest::Hello { version } => {
                if version != env!("CARGO_PKG_VERSION") {
                    tracing::warn!("client version {} differs from ours", version);
                }
                SyncResponse::Hello {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                }
            }
            SyncRequest::Shutdown => {
                tracing::info!("shutdown requested");
                self.cancel.cancel();
                SyncResponse::ShuttingDown
            }
        };
        let _ = reply.send(response);
    }

    async fn snapshot(&self) -> StatusSnapshot {
        let is_online = self.monitor.is_online();
        let stats = self.queue.stats().await;
        let meta = self.queue.sync_metadata().await;
        match (stats, meta) {
            (Ok(stats), Ok(meta)) => StatusSnapshot {
                pending_operations: stats.pending_operations,
                failed_operations: stats.failed_operations,
                is_online,
                last_sync: meta.last_sync_at,
                error: None,
            },
            (Err(e), _) | (_, Err(e)) => StatusSnapshot::fallback(is_online, e.to_string()),
        }
    }
}

impl BackgroundHandle {
    /// Send `request` and wait for its reply. No timeout is applied here.
    pub async fn request(&self, request: SyncRequest) -> Result<SyncResponse> {
        let name = request.name();
        let (reply, answer) = oneshot::channel();
        self.mailbox
            .send(Envelope { request, reply })
            .await
            .map_err(|_| Error::ContextUnavailable("background mailbox closed".to_string()))?;
        answer
            .await
            .map_err(|_| Error::ContextUnavailable(format!("{} dropped without a reply", name)))
    }

    /// Receive events published by the background context.
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Token cancelled when the context stops.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the actor task to exit.
    pub async fn join(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("background task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
