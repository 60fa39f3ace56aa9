// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync executor: drains the queue against the remote.
//!
//! A drain snapshots the replayable operations in enqueue order and applies
//! them one at a time. Once an operation on an entity fails transiently (or
//! its outcome could not be persisted) the rest of that entity's operations
//! are deferred to the next pass, so same-entity order always holds. A
//! single operation's error never aborts the pass.
//!
//! Several contexts drain the same store. Before touching an entity a pass
//! takes its lease in the store and keeps it until the pass ends; an entity
//! leased by another context is deferred.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use till_core::{ConnectionStatus, OpState, PendingOperation};
use till_ipc::{ExecutionContext, PassSummary};

use crate::error::{Error, Result};
use crate::queue::OperationQueue;
use crate::remote::{ApplyError, RemoteApply};

/// Resets the in-progress flag when a drain ends, including on early return.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lease duration used unless the executor is configured otherwise.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(120);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

/// Lease owner name, unique across executors and processes.
fn lease_owner(context: ExecutionContext) -> String {
    let n = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", context, std::process::id(), n)
}

/// What happened to one operation during a pass.
enum Outcome {
    Completed,
    /// Applied, but another context had already removed the record.
    AlreadyCompleted,
    Retried,
    Failed,
    /// Transient failure that used up the retry budget.
    Exhausted,
    StoreError,
}

/// Drives one queue instance to empty.
pub struct SyncExecutor {
    queue: Arc<OperationQueue>,
    remote: Arc<dyn RemoteApply>,
    online: watch::Receiver<ConnectionStatus>,
    context: ExecutionContext,
    trigger: Arc<Notify>,
    owner: String,
    lease_ttl: Duration,
    in_progress: AtomicBool,
    /// Bumped after every drain, successful or not, once the flag is released.
    finished: watch::Sender<u64>,
    last_pass: watch::Sender<Option<PassSummary>>,
    passes: broadcast::Sender<PassSummary>,
}

impl SyncExecutor {
    pub fn new(
        queue: Arc<OperationQueue>,
        remote: Arc<dyn RemoteApply>,
        online: watch::Receiver<ConnectionStatus>,
        context: ExecutionContext,
        trigger: Arc<Notify>,
    ) -> Self {
        let (finished, _) = watch::channel(0);
        let (last_pass, _) = watch::channel(None);
        let (passes, _) = broadcast::channel(32);
        SyncExecutor {
            queue,
            remote,
            online,
            context,
            trigger,
            owner: lease_owner(context),
            lease_ttl: DEFAULT_LEASE_TTL,
            in_progress: AtomicBool::new(false),
            finished,
            last_pass,
            passes,
        }
    }

    /// Hold entity leases for `ttl`. Must exceed the remote request timeout.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn is_draining(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Summary of the most recent pass, if any.
    pub fn last_pass(&self) -> Option<PassSummary> {
        self.last_pass.borrow().clone()
    }

    /// Receive every pass summary from now on.
    pub fn subscribe_passes(&self) -> broadcast::Receiver<PassSummary> {
        self.passes.subscribe()
    }

    /// Run one drain pass now.
    ///
    /// Fails with [`Error::Offline`] when there is no connectivity and with
    /// [`Error::DrainInProgress`] when another pass holds the queue.
    pub async fn drain(&self) -> Result<PassSummary> {
        if !self.online.borrow().is_online {
            return Err(Error::Offline);
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::DrainInProgress);
        }
        let result = {
            let _guard = DrainGuard(&self.in_progress);
            self.run_pass().await
        };
        self.finished.send_modify(|n| *n += 1);

        if let Ok(summary) = &result {
            self.last_pass.send_replace(Some(summary.clone()));
            let _ = self.passes.send(summary.clone());
        }
        result
    }

    /// Run a drain of its own, waiting for any pass already in progress to
    /// finish first. Resolves when this specific drain completes.
    pub async fn drain_when_idle(&self) -> Result<PassSummary> {
        let mut finished = self.finished.subscribe();
        loop {
            finished.mark_unchanged();
            match self.drain().await {
                Err(Error::DrainInProgress) => {
                    if finished.changed().await.is_err() {
                        return Err(Error::DrainInProgress);
                    }
                }
                other => return other,
            }
        }
    }

    /// Start a drain in a separate task.
    pub fn spawn_drain(self: &Arc<Self>) -> JoinHandle<Result<PassSummary>> {
        let executor = Arc::clone(self);
        tokio::spawn(async move { executor.drain().await })
    }

    /// Drain on every trigger and on every offline to online transition
    /// until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut online = self.online.clone();
        let mut was_online = online.borrow_and_update().is_online;
        if was_online {
            self.drain_logged().await;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.trigger.notified() => self.drain_logged().await,
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = online.borrow_and_update().is_online;
                    if now_online && !was_online {
                        self.drain_logged().await;
                    }
                    was_online = now_online;
                }
            }
        }
        tracing::debug!("{} executor stopped", self.context);
    }

    async fn drain_logged(&self) {
        match self.drain().await {
            Ok(_) => {}
            Err(Error::Offline) => tracing::debug!("skipping drain: offline"),
            Err(Error::DrainInProgress) => tracing::debug!("skipping drain: already running"),
            Err(e) => tracing::warn!("{} drain failed: {}", self.context, e),
        }
    }

    async fn run_pass(&self) -> Result<PassSummary> {
        let snapshot = self.queue.list().await?;
        let mut summary = PassSummary::empty(self.context);
        let mut blocked: HashSet<String> = HashSet::new();
        let mut leased = false;

        if !snapshot.is_empty() {
            tracing::info!("{} drain: {} operations", self.context, snapshot.len());
        }

        for op in snapshot {
            let key = op.ordering_key();
            if blocked.contains(&key) {
                tracing::debug!("deferring {} behind earlier failure on {}", op.id, key);
                summary.deferred += 1;
                continue;
            }
            match self.queue.claim_entity(&key, &self.owner, self.lease_ttl).await {
                Ok(true) => leased = true,
                Ok(false) => {
                    tracing::debug!("{} is being drained elsewhere; deferring {}", key, op.id);
                    summary.deferred += 1;
                    blocked.insert(key);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("could not lease {}: {}", key, e);
                    summary.store_errors += 1;
                    blocked.insert(key);
                    continue;
                }
            }
            if !self.still_pending(&op).await {
                continue;
            }

            summary.attempted += 1;
            match self.apply_one(&op).await {
                Outcome::Completed => summary.completed += 1,
                Outcome::AlreadyCompleted => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Exhausted => {
                    summary.failed += 1;
                    blocked.insert(key);
                }
                Outcome::Retried => {
                    summary.retried += 1;
                    blocked.insert(key);
                }
                Outcome::StoreError => {
                    summary.store_errors += 1;
                    blocked.insert(key);
                }
            }
        }

        if leased {
            if let Err(e) = self.queue.release_entities(&self.owner).await {
                tracing::warn!("failed to release entity leases: {}", e);
            }
        }

        summary.finished_at = Utc::now();
        if summary.attempted > 0 && summary.is_clean() {
            if let Err(e) = self.queue.record_sync().await {
                tracing::warn!("failed to record sync metadata: {}", e);
            }
        }
        self.queue.publish_stats().await;

        if summary.attempted > 0 || summary.deferred > 0 {
            tracing::info!("{}", summary);
        }
        Ok(summary)
    }

    /// Skip records another context completed, discarded or failed since the snapshot.
    async fn still_pending(&self, op: &PendingOperation) -> bool {
        match self.queue.get(&op.id).await {
            Ok(Some(current)) => current.is_replayable(self.queue.max_retries()),
            Ok(None) => false,
            // Let the apply path surface the store problem
            Err(_) => true,
        }
    }

    async fn apply_one(&self, op: &PendingOperation) -> Outcome {
        match self.remote.apply(op).await {
            Ok(()) => match self.queue.complete(&op.id).await {
                Ok(true) => {
                    tracing::debug!("{} applied", op.id);
                    Outcome::Completed
                }
                Ok(false) => {
                    tracing::debug!("{} applied after another context completed it", op.id);
                    Outcome::AlreadyCompleted
                }
                Err(e) => {
                    tracing::warn!("{} applied but not removed: {}", op.id, e);
                    Outcome::StoreError
                }
            },
            Err(ApplyError::Transient(reason)) => {
                tracing::warn!("{} failed transiently: {}", op.id, reason);
                match self.queue.mark_retried(&op.id).await {
                    Ok(updated) if updated.state == OpState::Failed => Outcome::Exhausted,
                    Ok(_) => Outcome::Retried,
                    Err(e) => {
                        tracing::warn!("{} retry not recorded: {}", op.id, e);
                        Outcome::StoreError
                    }
                }
            }
            Err(ApplyError::Permanent(reason)) => {
                tracing::warn!("{} rejected: {}", op.id, reason);
                match self.queue.fail(&op.id).await {
                    Ok(()) => Outcome::Failed,
                    Err(e) => {
                        tracing::warn!("{} failure not recorded: {}", op.id, e);
                        Outcome::StoreError
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
