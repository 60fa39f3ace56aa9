// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for sync module tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use till_core::{OpType, OperationStore, PendingOperation, QueueStats, SqliteStore, SyncMetadata};

use crate::monitor::{Probe, ProbeResult};
use crate::remote::{ApplyError, ApplyResult, RemoteApply};

/// One call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCall {
    pub op_id: String,
    pub op_type: OpType,
    pub entity_kind: String,
    pub entity_id: Option<String>,
    /// The payload's `step` field, when present.
    pub step: Option<u64>,
}

#[derive(Default)]
struct RemoteState {
    scripted: HashMap<String, VecDeque<ApplyResult>>,
    calls: Vec<AppliedCall>,
    entities: HashMap<String, Value>,
    errors: Vec<String>,
}

/// Scripted remote that simulates an authoritative entity store.
///
/// Outcomes are scripted per entity key (`kind/id`). Unscripted calls
/// succeed. Successful calls mutate the simulated store; an Update or Delete
/// on a missing entity is recorded in `errors`.
#[derive(Default)]
pub struct MockRemote {
    state: Arc<Mutex<RemoteState>>,
    delay: Option<Duration>,
    hang: AtomicBool,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering each call.
    pub fn with_delay(delay: Duration) -> Self {
        MockRemote {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Another remote over the same simulated store, answering after `delay`.
    pub fn sharing_with_delay(&self, delay: Duration) -> Self {
        MockRemote {
            state: Arc::clone(&self.state),
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap()
    }

    /// Queue outcomes for the next calls on `key` (`kind/id`).
    pub fn script(&self, key: &str, outcomes: Vec<ApplyResult>) {
        self.state()
            .scripted
            .entry(key.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Never answer any call.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<AppliedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn entity(&self, key: &str) -> Option<Value> {
        self.state().entities.get(key).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.state().entities.len()
    }

    pub fn errors(&self) -> Vec<String> {
        self.state().errors.clone()
    }

    fn respond(&self, op: &PendingOperation) -> ApplyResult {
        let key = op.ordering_key();
        let mut state = self.state();
        state.calls.push(AppliedCall {
            op_id: op.id.clone(),
            op_type: op.op_type,
            entity_kind: op.entity_kind.clone(),
            entity_id: op.entity_id(),
            step: op.payload.get("step").and_then(Value::as_u64),
        });

        if let Some(outcome) = state.scripted.get_mut(&key).and_then(|q| q.pop_front()) {
            outcome?;
        }

        match op.op_type {
            OpType::Create | OpType::Update => {
                if op.op_type == OpType::Update && !state.entities.contains_key(&key) {
                    state.errors.push(format!("update on missing {key}"));
                }
                state.entities.insert(key, op.payload.clone());
            }
            OpType::Delete => {
                if state.entities.remove(&key).is_none() {
                    state.errors.push(format!("delete on missing {key}"));
                }
            }
        }
        Ok(())
    }
}

impl RemoteApply for MockRemote {
    fn apply<'a>(
        &'a self,
        op: &'a PendingOperation,
    ) -> Pin<Box<dyn Future<Output = ApplyResult> + Send + 'a>> {
        Box::pin(async move {
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.respond(op)
        })
    }
}

pub fn transient() -> ApplyResult {
    Err(ApplyError::Transient("remote returned 500".into()))
}

pub fn permanent() -> ApplyResult {
    Err(ApplyError::Permanent("remote rejected with 400".into()))
}

/// Probe with a switchable outcome.
pub struct MockProbe {
    reachable: AtomicBool,
    hang: AtomicBool,
    calls: AtomicU32,
}

impl MockProbe {
    pub fn new(reachable: bool) -> Self {
        MockProbe {
            reachable: AtomicBool::new(reachable),
            hang: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Probe for MockProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.reachable.load(Ordering::SeqCst) {
                Ok(Duration::from_millis(12))
            } else {
                Err("connection refused".to_string())
            }
        })
    }
}

/// Store wrapper that injects failures on demand.
pub struct FailingStore {
    inner: SqliteStore,
    fail_complete: AtomicBool,
    fail_put: AtomicBool,
    fail_reads: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        FailingStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_complete: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn fail_complete(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> till_core::Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(till_core::Error::StoreUnavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl OperationStore for FailingStore {
    fn put(&self, op: &PendingOperation) -> till_core::Result<()> {
        Self::check(&self.fail_put)?;
        self.inner.put(op)
    }

    fn get(&self, id: &str) -> till_core::Result<Option<PendingOperation>> {
        Self::check(&self.fail_reads)?;
        self.inner.get(id)
    }

    fn get_all(&self) -> till_core::Result<Vec<PendingOperation>> {
        Self::check(&self.fail_reads)?;
        self.inner.get_all()
    }

    fn remove(&self, id: &str) -> till_core::Result<bool> {
        self.inner.remove(id)
    }

    fn clear(&self) -> till_core::Result<()> {
        self.inner.clear()
    }

    fn complete(&self, id: &str) -> till_core::Result<bool> {
        Self::check(&self.fail_complete)?;
        self.inner.complete(id)
    }

    fn reset(&self, id: &str) -> till_core::Result<bool> {
        self.inner.reset(id)
    }

    fn stats(&self, max_retries: u32) -> till_core::Result<QueueStats> {
        Self::check(&self.fail_reads)?;
        self.inner.stats(max_retries)
    }

    fn sync_metadata(&self) -> till_core::Result<SyncMetadata> {
        Self::check(&self.fail_reads)?;
        self.inner.sync_metadata()
    }

    fn record_sync(&self, at: DateTime<Utc>) -> till_core::Result<SyncMetadata> {
        self.inner.record_sync(at)
    }

    fn claim_entity(
        &self,
        entity_key: &str,
        owner: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> till_core::Result<bool> {
        self.inner.claim_entity(entity_key, owner, now, until)
    }

    fn release_entities(&self, owner: &str) -> till_core::Result<()> {
        self.inner.release_entities(owner)
    }
}

/// In-memory store shared by the components under test.
pub fn memory_store() -> Arc<dyn OperationStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// RAII guard that sets/removes an env var and restores it on drop.
///
/// Holds a process-wide lock so env-dependent tests do not interleave.
pub struct EnvGuard {
    key: &'static str,
    original: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self {
            key,
            original,
            _lock: lock,
        }
    }

    pub fn remove(key: &'static str) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let original = std::env::var(key).ok();
        std::env::remove_var(key);
        Self {
            key,
            original,
            _lock: lock,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(val) => std::env::set_var(self.key, val),
            None => std::env::remove_var(self.key),
        }
    }
}

/// Spawn a background context over `store` and return its handle and monitor.
pub fn spawn_background(
    store: Arc<dyn OperationStore>,
    remote: Arc<MockRemote>,
    probe: Arc<MockProbe>,
    initial: till_core::ConnectionStatus,
) -> (
    crate::background::BackgroundHandle,
    Arc<crate::monitor::ConnectionMonitor>,
) {
    let ctx = crate::background::BackgroundContext::new(
        &crate::config::Config::default(),
        store,
        remote,
        probe,
        initial,
    );
    let monitor = Arc::clone(ctx.monitor());
    (ctx.spawn(), monitor)
}
