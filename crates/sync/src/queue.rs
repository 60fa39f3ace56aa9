// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation queue on top of the durable store.
//!
//! Every mutation issued by the application is recorded here first, online
//! or not. The queue owns the record lifecycle (retry bookkeeping,
//! completion, failure and the user actions on Failed records) and publishes
//! fresh [`QueueStats`] after every change.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Notify};

use till_core::{
    generate_unique_op_id, ConnectionStatus, OpState, OpType, OperationStore, PendingOperation,
    QueueStats, SyncMetadata,
};

use crate::error::{Error, Result};
use crate::listeners::{Listeners, Subscription};

/// Best-effort sync trigger fired after an enqueue while online.
struct Trigger {
    notify: Arc<Notify>,
    online: watch::Receiver<ConnectionStatus>,
}

/// Insertion-ordered queue of pending operations.
pub struct OperationQueue {
    store: Arc<dyn OperationStore>,
    max_retries: u32,
    listeners: Listeners<QueueStats>,
    trigger: Option<Trigger>,
}

impl OperationQueue {
    pub fn new(store: Arc<dyn OperationStore>, max_retries: u32) -> Self {
        OperationQueue {
            store,
            max_retries,
            listeners: Listeners::new("queue"),
            trigger: None,
        }
    }

    /// Wake `notify` after each enqueue made while `online` reports online.
    pub fn with_trigger(
        mut self,
        notify: Arc<Notify>,
        online: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        self.trigger = Some(Trigger { notify, online });
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `f` against the store on the blocking pool.
    ///
    /// SQLite calls may wait on the file lock held by another process, so
    /// they never run on a runtime worker.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn OperationStore) -> till_core::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| {
                till_core::Error::StoreUnavailable(format!("store task did not finish: {e}"))
            })?;
        Ok(outcome?)
    }

    /// Record a new operation and return its id.
    ///
    /// Returns as soon as the record is durable; never waits on the network.
    pub async fn enqueue(
        &self,
        op_type: OpType,
        entity_kind: &str,
        payload: Value,
    ) -> Result<String> {
        let entity_kind = entity_kind.trim().to_string();
        if entity_kind.is_empty() {
            return Err(till_core::Error::InvalidInput("entity kind must not be empty".into()).into());
        }

        let op = self
            .with_store(move |store| {
                let enqueued_at = Utc::now();
                let id = generate_unique_op_id(&entity_kind, &enqueued_at, |candidate| {
                    matches!(store.get(candidate), Ok(Some(_)))
                });
                let op = PendingOperation::new(id, op_type, entity_kind, payload, enqueued_at);
                store.put(&op)?;
                Ok(op)
            })
            .await?;
        tracing::debug!("enqueued {} {} {}", op.id, op.op_type, op.entity_kind);

        self.publish_stats().await;
        self.fire_trigger();
        Ok(op.id)
    }

    fn fire_trigger(&self) {
        if let Some(trigger) = &self.trigger {
            if trigger.online.borrow().is_online {
                trigger.notify.notify_one();
            }
        }
    }

    /// Operations eligible for replay, oldest first.
    pub async fn list(&self) -> Result<Vec<PendingOperation>> {
        let max_retries = self.max_retries;
        let ops = self.with_store(|store| store.get_all()).await?;
        Ok(ops
            .into_iter()
            .filter(|op| op.is_replayable(max_retries))
            .collect())
    }

    /// Every stored operation, replayable or not, oldest first.
    pub async fn all(&self) -> Result<Vec<PendingOperation>> {
        self.with_store(|store| store.get_all()).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<PendingOperation>> {
        let id = id.to_string();
        self.with_store(move |store| store.get(&id)).await
    }

    /// Count one more transient failure for `id` and persist it.
    ///
    /// Reaching the retry cap moves the record to Failed. The record is
    /// never deleted here. Returns the updated record.
    pub async fn mark_retried(&self, id: &str) -> Result<PendingOperation> {
        let id = id.to_string();
        let max_retries = self.max_retries;
        let op = self
            .with_store(move |store| {
                let mut op = require(store, &id)?;
                op.retry_count = op.retry_count.saturating_add(1);
                if op.retry_count >= max_retries {
                    op.state = OpState::Failed;
                }
                store.put(&op)?;
                Ok(op)
            })
            .await?;
        if op.state == OpState::Failed {
            tracing::warn!("{} reached {} retries; moving to failed", op.id, max_retries);
        }
        self.publish_stats().await;
        Ok(op)
    }

    /// Remove an acknowledged operation. Returns false if it was already gone.
    pub async fn complete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let removed = self.with_store(move |store| store.complete(&id)).await?;
        self.publish_stats().await;
        Ok(removed)
    }

    /// Move `id` to the Failed state.
    pub async fn fail(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_store(move |store| {
            let mut op = require(store, &id)?;
            op.state = OpState::Failed;
            store.put(&op)
        })
        .await?;
        self.publish_stats().await;
        Ok(())
    }

    /// Operations excluded from automatic replay, oldest first.
    pub async fn failed(&self) -> Result<Vec<PendingOperation>> {
        let max_retries = self.max_retries;
        let ops = self.with_store(|store| store.get_all()).await?;
        Ok(ops
            .into_iter()
            .filter(|op| !op.is_replayable(max_retries))
            .collect())
    }

    /// Return a Failed operation to the queue with a fresh retry budget.
    pub async fn resubmit(&self, id: &str) -> Result<()> {
        let owned = id.to_string();
        if !self.with_store(move |store| store.reset(&owned)).await? {
            return Err(till_core::Error::OperationNotFound(id.to_string()).into());
        }
        tracing::info!("resubmitted {}", id);
        self.publish_stats().await;
        self.fire_trigger();
        Ok(())
    }

    /// Drop an operation without applying it. Not counted as completed.
    pub async fn discard(&self, id: &str) -> Result<()> {
        let owned = id.to_string();
        if !self.with_store(move |store| store.remove(&owned)).await? {
            return Err(till_core::Error::OperationNotFound(id.to_string()).into());
        }
        tracing::info!("discarded {}", id);
        self.publish_stats().await;
        Ok(())
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let max_retries = self.max_retries;
        self.with_store(move |store| store.stats(max_retries)).await
    }

    pub async fn sync_metadata(&self) -> Result<SyncMetadata> {
        self.with_store(|store| store.sync_metadata()).await
    }

    /// Record a successful sync pass.
    pub async fn record_sync(&self) -> Result<SyncMetadata> {
        self.with_store(|store| store.record_sync(Utc::now())).await
    }

    /// Take or renew the drain lease on `entity_key` for `ttl`.
    ///
    /// Returns false while another owner holds an unexpired lease.
    pub async fn claim_entity(
        &self,
        entity_key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::Config(format!("lease duration out of range: {e}")))?;
        let key = entity_key.to_string();
        let owner = owner.to_string();
        self.with_store(move |store| {
            let now = Utc::now();
            store.claim_entity(&key, &owner, now, now + ttl)
        })
        .await
    }

    /// Drop every drain lease held by `owner`.
    pub async fn release_entities(&self, owner: &str) -> Result<()> {
        let owner = owner.to_string();
        self.with_store(move |store| store.release_entities(&owner)).await
    }

    /// Subscribe to stats changes. The listener runs immediately with the
    /// current stats.
    pub async fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&QueueStats) + Send + Sync + 'static,
    {
        let current = self.stats().await?;
        Ok(self.listeners.subscribe(Some(&current), listener))
    }

    /// Recompute stats and notify listeners.
    pub async fn publish_stats(&self) {
        if self.listeners.is_empty() {
            return;
        }
        match self.stats().await {
            Ok(stats) => self.listeners.publish(&stats),
            Err(e) => tracing::warn!("failed to compute queue stats: {}", e),
        }
    }

    /// Drop every stats listener.
    pub fn clear_listeners(&self) {
        self.listeners.clear();
    }
}

fn require(store: &dyn OperationStore, id: &str) -> till_core::Result<PendingOperation> {
    store
        .get(id)?
        .ok_or_else(|| till_core::Error::OperationNotFound(id.to_string()))
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
