// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection monitor: the single source of truth for reachability.
//!
//! Status comes from two sources. Platform transitions arrive as
//! [`NetworkEvent`]s and are applied immediately. A periodic health probe
//! catches stale platform flags: a failed probe while online flips to
//! offline, a successful probe while offline flips to online.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use till_core::ConnectionStatus;

use crate::config::Config;
use crate::error::Result;
use crate::listeners::{Listeners, Subscription};

/// Platform-level connectivity transition.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// The platform reports a usable link. Link details are carried along;
    /// `is_online` is forced to true.
    Online(ConnectionStatus),
    /// The platform reports no link.
    Offline,
}

/// Outcome of one reachability probe: the measured round-trip time, or why
/// the probe failed.
pub type ProbeResult = std::result::Result<Duration, String>;

/// Lightweight reachability check.
pub trait Probe: Send + Sync {
    fn check(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>>;
}

/// Probe issuing a GET against the configured health endpoint.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.probe.timeout())
            .build()?;
        Ok(HttpProbe {
            client,
            url: config.probe_url(),
        })
    }
}

impl Probe for HttpProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + '_>> {
        Box::pin(async move {
            let start = Instant::now();
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            // Any answer from the server means the network path works
            if response.status().is_server_error() {
                return Err(format!("health endpoint returned {}", response.status()));
            }
            Ok(start.elapsed())
        })
    }
}

/// Tracks online/offline state and publishes every change.
pub struct ConnectionMonitor {
    state: watch::Sender<ConnectionStatus>,
    listeners: Listeners<ConnectionStatus>,
    probe: Arc<dyn Probe>,
    interval: Duration,
    probe_timeout: Duration,
    cancel: CancellationToken,
    destroyed: AtomicBool,
}

impl ConnectionMonitor {
    /// Create a monitor starting from `initial`. Nothing runs until [`start`](Self::start).
    pub fn new(
        probe: Arc<dyn Probe>,
        interval: Duration,
        probe_timeout: Duration,
        initial: ConnectionStatus,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        ConnectionMonitor {
            state,
            listeners: Listeners::new("connection"),
            probe,
            interval,
            probe_timeout,
            cancel: CancellationToken::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Create a monitor using the probe settings from `config`.
    pub fn from_config(config: &Config, probe: Arc<dyn Probe>, initial: ConnectionStatus) -> Self {
        Self::new(
            probe,
            config.probe.interval(),
            config.probe.timeout(),
            initial,
        )
    }

    /// Spawn the periodic probe loop. The first probe runs immediately.
    pub fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.probe_now().await;
                    }
                }
            }
            tracing::debug!("probe loop stopped");
        });
    }

    /// Forward platform transitions from `events` until the stream closes or
    /// the monitor is destroyed.
    pub fn watch_events(self: &Arc<Self>, mut events: mpsc::Receiver<NetworkEvent>) {
        let monitor = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => monitor.handle_event(event),
                        None => break,
                    },
                }
            }
        });
    }

    /// Apply a platform transition and publish synchronously.
    pub fn handle_event(&self, event: NetworkEvent) {
        let next = match event {
            NetworkEvent::Online(mut status) => {
                status.is_online = true;
                status
            }
            NetworkEvent::Offline => ConnectionStatus::offline(),
        };
        self.apply(next);
    }

    /// Run one probe now and return the resulting online flag.
    pub async fn probe_now(&self) -> bool {
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => return self.is_online(),
            r = tokio::time::timeout(self.probe_timeout, self.probe.check()) => r,
        };

        let current = self.status();
        match outcome {
            Ok(Ok(rtt)) => {
                let rtt = u64::try_from(rtt.as_millis()).ok();
                let next = ConnectionStatus {
                    is_online: true,
                    rtt,
                    ..current.clone()
                };
                if !current.is_online {
                    tracing::info!("reachability probe succeeded while offline; going online");
                }
                self.apply(next);
            }
            Ok(Err(reason)) => self.probe_failed(&current, &reason),
            Err(_) => self.probe_failed(&current, "probe timed out"),
        }
        self.is_online()
    }

    fn probe_failed(&self, current: &ConnectionStatus, reason: &str) {
        if current.is_online {
            tracing::warn!("reachability probe failed while online ({}); going offline", reason);
            self.apply(ConnectionStatus::offline());
        } else {
            tracing::debug!("reachability probe failed: {}", reason);
        }
    }

    fn apply(&self, next: ConnectionStatus) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        let was_online = self.state.borrow().is_online;
        let changed = self.state.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next.clone();
                true
            }
        });
        if changed {
            if was_online != next.is_online {
                tracing::info!(
                    "connection {}",
                    if next.is_online { "online" } else { "offline" }
                );
            }
            self.listeners.publish(&next);
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().is_online
    }

    /// Receiver that observes every status change.
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.state.subscribe()
    }

    /// Subscribe to status changes. The listener runs immediately with the
    /// current status.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let current = self.status();
        self.listeners.subscribe(Some(&current), listener)
    }

    /// Stop probing, stop event forwarding and drop every listener. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        self.listeners.clear();
        tracing::debug!("connection monitor destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
