// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync coordinator: the surface the rest of the application uses.
//!
//! The coordinator lives in the foreground context. It owns the foreground
//! monitor, queue and executor and reaches the background context only
//! through a [`ContextChannel`]. Every cross-context call is bounded by a
//! timeout; a background context that never answers yields a failure result
//! or a safe default, never a hang.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use till_core::{ConnectionStatus, OpType, OperationStore, PendingOperation, QueueStats};
use till_ipc::{ExecutionContext, PassSummary, StatusSnapshot, SyncEvent, SyncRequest, SyncResponse};

use crate::channel::ContextChannel;
use crate::config::{Config, SyncConfig};
use crate::error::{Error, Result};
use crate::executor::SyncExecutor;
use crate::listeners::{Listeners, Subscription};
use crate::monitor::{ConnectionMonitor, NetworkEvent, Probe};
use crate::queue::OperationQueue;
use crate::remote::RemoteApply;

/// Value delivered to coordinator subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Connection(ConnectionStatus),
    Queue(QueueStats),
    /// A drain pass finished in either context.
    Pass(PassSummary),
}

/// Result of [`SyncCoordinator::force_sync`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceSyncResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PassSummary>,
}

impl ForceSyncResult {
    fn ok(summary: PassSummary) -> Self {
        ForceSyncResult {
            success: true,
            error: None,
            summary: Some(summary),
        }
    }

    fn failed(error: impl ToString) -> Self {
        ForceSyncResult {
            success: false,
            error: Some(error.to_string()),
            summary: None,
        }
    }
}

/// Integration surface over the foreground components and a background channel.
pub struct SyncCoordinator {
    monitor: Arc<ConnectionMonitor>,
    queue: Arc<OperationQueue>,
    executor: Arc<SyncExecutor>,
    channel: Arc<dyn ContextChannel>,
    timeouts: SyncConfig,
    passes: Arc<Listeners<PassSummary>>,
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl SyncCoordinator {
    /// Wire explicitly constructed components together.
    pub fn new(
        monitor: Arc<ConnectionMonitor>,
        queue: Arc<OperationQueue>,
        executor: Arc<SyncExecutor>,
        channel: Arc<dyn ContextChannel>,
        timeouts: SyncConfig,
    ) -> Self {
        SyncCoordinator {
            monitor,
            queue,
            executor,
            channel,
            timeouts,
            passes: Arc::new(Listeners::new("pass")),
            cancel: CancellationToken::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build the foreground components from `config` over `store`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn OperationStore>,
        remote: Arc<dyn RemoteApply>,
        probe: Arc<dyn Probe>,
        channel: Arc<dyn ContextChannel>,
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
                ExecutionContext::Foreground,
                trigger,
            )
            .with_lease_ttl(config.lease_ttl()),
        );
        Self::new(monitor, queue, executor, channel, config.sync.clone())
    }

    /// Start probing, automatic foreground drains and pass forwarding.
    ///
    /// Background events are followed when the channel offers them; a
    /// background context that is not running is not an error here.
    pub async fn start(&self) {
        self.monitor.start();
        tokio::spawn(Arc::clone(&self.executor).run(self.cancel.clone()));

        let mut foreground = self.executor.subscribe_passes();
        let passes = Arc::clone(&self.passes);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    pass = foreground.recv() => match pass {
                        Ok(summary) => passes.publish(&summary),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        match tokio::time::timeout(self.timeouts.status_timeout(), self.channel.events()).await {
            Ok(Ok(events)) => self.forward_background_events(events),
            Ok(Err(e)) => tracing::debug!("not following background events: {}", e),
            Err(_) => tracing::debug!("not following background events: timed out"),
        }
    }

    fn forward_background_events(&self, mut events: broadcast::Receiver<SyncEvent>) {
        let passes = Arc::clone(&self.passes);
        let queue = Arc::clone(&self.queue);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(SyncEvent::PassCompleted(summary)) => {
                        // The background pass changed the shared store
                        queue.publish_stats().await;
                        passes.publish(&summary);
                    }
                    Ok(SyncEvent::ConnectivityChanged { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Subscribe to connection, queue and pass updates.
    ///
    /// The listener runs immediately with the current connection status and
    /// queue stats. Dropping the returned handle unsubscribes.
    pub async fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&StatusUpdate) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let on_connection = {
            let listener = Arc::clone(&listener);
            self.monitor
                .subscribe(move |s| (*listener)(&StatusUpdate::Connection(s.clone())))
        };
        let on_queue = {
            let listener = Arc::clone(&listener);
            self.queue
                .subscribe(move |s| (*listener)(&StatusUpdate::Queue(*s)))
                .await?
        };
        let on_pass = self
            .passes
            .subscribe(None, move |p| (*listener)(&StatusUpdate::Pass(p.clone())));
        Ok(Subscription::combine([on_connection, on_queue, on_pass]))
    }

    /// Subscribe to connection status only.
    pub fn subscribe_connection<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.monitor.subscribe(listener)
    }

    /// Subscribe to queue statistics only.
    pub async fn subscribe_stats<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&QueueStats) + Send + Sync + 'static,
    {
        self.queue.subscribe(listener).await
    }

    /// Record a mutation. Returns the operation id without touching the network.
    pub async fn enqueue(
        &self,
        op_type: OpType,
        entity_kind: &str,
        payload: Value,
    ) -> Result<String> {
        self.queue.enqueue(op_type, entity_kind, payload).await
    }

    /// Apply a platform connectivity transition.
    pub fn handle_network_event(&self, event: NetworkEvent) {
        self.monitor.handle_event(event);
    }

    /// Ask the background context to drain now.
    ///
    /// Resolves when that drain completes or the force-sync timeout elapses.
    pub async fn force_sync(&self) -> ForceSyncResult {
        let after = self.timeouts.force_sync_timeout();
        match self.bounded("FORCE_SYNC", after, SyncRequest::ForceSync).await {
            Ok(SyncResponse::SyncComplete(summary)) => {
                self.queue.publish_stats().await;
                ForceSyncResult::ok(summary)
            }
            Ok(SyncResponse::SyncFailed { error }) => ForceSyncResult::failed(error),
            Ok(SyncResponse::Error { message }) => ForceSyncResult::failed(message),
            Ok(other) => ForceSyncResult::failed(Error::Protocol(format!(
                "unexpected reply to FORCE_SYNC: {:?}",
                other
            ))),
            Err(e) => {
                tracing::warn!("force sync failed: {}", e);
                ForceSyncResult::failed(e)
            }
        }
    }

    /// Read-only status snapshot from the background context.
    ///
    /// Falls back to zero pending and the local online flag when the
    /// background context does not answer within the status timeout.
    pub async fn get_status(&self) -> StatusSnapshot {
        let after = self.timeouts.status_timeout();
        match self
            .bounded("GET_SYNC_STATUS", after, SyncRequest::GetSyncStatus)
            .await
        {
            Ok(SyncResponse::SyncStatus(snapshot)) => snapshot,
            Ok(other) => StatusSnapshot::fallback(
                self.monitor.is_online(),
                format!("unexpected reply to GET_SYNC_STATUS: {:?}", other),
            ),
            Err(e) => StatusSnapshot::fallback(self.monitor.is_online(), e.to_string()),
        }
    }

    /// Register for background draining under `tag`. Returns all active tags.
    pub async fn register_background_sync(&self, tag: &str) -> Result<Vec<String>> {
        let request = SyncRequest::RegisterSync {
            tag: tag.to_string(),
        };
        match self
            .bounded("REGISTER_SYNC", self.timeouts.status_timeout(), request)
            .await?
        {
            SyncResponse::Registered { tags } => Ok(tags),
            SyncResponse::Error { message } => Err(Error::Protocol(message)),
            other => Err(Error::Protocol(format!(
                "unexpected reply to REGISTER_SYNC: {:?}",
                other
            ))),
        }
    }

    async fn bounded(
        &self,
        name: &'static str,
        after: Duration,
        request: SyncRequest,
    ) -> Result<SyncResponse> {
        match tokio::time::timeout(after, self.channel.request(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ContextTimeout {
                request: name,
                after,
            }),
        }
    }

    /// Run a foreground drain now, bypassing the background context.
    pub async fn drain_here(&self) -> Result<PassSummary> {
        self.executor.drain_when_idle().await
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.monitor.status()
    }

    /// Probe the remote now instead of waiting for the next interval.
    pub async fn refresh_connection(&self) -> bool {
        self.monitor.probe_now().await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        self.queue.stats().await
    }

    pub async fn pending(&self) -> Result<Vec<PendingOperation>> {
        self.queue.list().await
    }

    pub async fn failed(&self) -> Result<Vec<PendingOperation>> {
        self.queue.failed().await
    }

    pub async fn resubmit(&self, id: &str) -> Result<()> {
        self.queue.resubmit(id).await
    }

    pub async fn discard(&self, id: &str) -> Result<()> {
        self.queue.discard(id).await
    }

    /// Stop every task and drop every listener. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        self.monitor.destroy();
        self.queue.clear_listeners();
        self.passes.clear();
        tracing::debug!("sync coordinator shut down");
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
