// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channels from the foreground to a background context.
//!
//! [`MailboxChannel`] talks to an actor in the same process.
//! [`SocketChannel`] talks to `tilld` over its Unix socket, one connection
//! per request, using the length-prefixed framing from `till-ipc`. The
//! coordinator applies timeouts on top of either.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use till_ipc::{framing_async, SyncEvent, SyncRequest, SyncResponse};

use crate::background::BackgroundHandle;
use crate::error::{Error, Result};

/// How long the socket server waits for a client to send its request.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request/response path to a background context.
pub trait ContextChannel: Send + Sync {
    /// Send one request and wait for its reply.
    fn request(&self, request: SyncRequest) -> BoxFuture<'_, Result<SyncResponse>>;

    /// Follow events published by the background context.
    fn events(&self) -> BoxFuture<'_, Result<broadcast::Receiver<SyncEvent>>>;
}

/// In-process channel to a [`BackgroundHandle`].
#[derive(Clone)]
pub struct MailboxChannel {
    handle: BackgroundHandle,
}

impl MailboxChannel {
    pub fn new(handle: BackgroundHandle) -> Self {
        MailboxChannel { handle }
    }
}

impl ContextChannel for MailboxChannel {
    fn request(&self, request: SyncRequest) -> BoxFuture<'_, Result<SyncResponse>> {
        Box::pin(self.handle.request(request))
    }

    fn events(&self) -> BoxFuture<'_, Result<broadcast::Receiver<SyncEvent>>> {
        Box::pin(async move { Ok(self.handle.events()) })
    }
}

/// Channel to `tilld` over a Unix socket.
#[derive(Debug, Clone)]
pub struct SocketChannel {
    path: PathBuf,
}

impl SocketChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SocketChannel { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.path).await.map_err(|e| {
            Error::ContextUnavailable(format!("cannot connect to {}: {}", self.path.display(), e))
        })
    }

    /// Whether a daemon answers PING on this socket within `within`.
    pub async fn is_alive(&self, within: Duration) -> bool {
        matches!(
            tokio::time::timeout(within, self.request(SyncRequest::Ping)).await,
            Ok(Ok(SyncResponse::Pong))
        )
    }
}

impl ContextChannel for SocketChannel {
    fn request(&self, request: SyncRequest) -> BoxFuture<'_, Result<SyncResponse>> {
        Box::pin(async move {
            let mut stream = self.connect().await?;
            framing_async::write_message(&mut stream, &request).await?;
            let response = framing_async::read_message(&mut stream)
                .await
                .map_err(|e| {
                    Error::ContextUnavailable(format!("{} got no reply: {}", request.name(), e))
                })?;
            Ok(response)
        })
    }

    fn events(&self) -> BoxFuture<'_, Result<broadcast::Receiver<SyncEvent>>> {
        Box::pin(async move {
            let mut stream = self.connect().await?;
            framing_async::write_message(&mut stream, &SyncRequest::WatchEvents).await?;
            let (tx, rx) = broadcast::channel(64);
            tokio::spawn(async move {
                loop {
                    match framing_async::read_message::<_, SyncResponse>(&mut stream).await {
                        Ok(SyncResponse::Event { event }) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(other) => tracing::debug!("ignoring {:?} on event stream", other),
                        Err(_) => break,
                    }
                }
            });
            Ok(rx)
        })
    }
}

/// Serve the cross-context protocol on `listener` until `cancel` fires.
///
/// Each connection carries one request, except WATCH_EVENTS which keeps the
/// connection open and streams events. On cancellation, in-flight replies
/// (including the SHUTDOWN acknowledgement) get up to [`READ_TIMEOUT`] to
/// be written before their tasks are aborted.
pub async fn serve(listener: UnixListener, handle: BackgroundHandle, cancel: CancellationToken) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let handle = handle.clone();
                    let cancel = cancel.clone();
                    connections.spawn(async move {
                        if let Err(e) = serve_connection(stream, handle, cancel).await {
                            tracing::warn!("connection error: {}", e);
                        }
                    });
                }
                Err(e) => tracing::warn!("failed to accept connection: {}", e),
            },
        }
    }
    drop(listener);

    let drained = tokio::time::timeout(READ_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!("aborting {} unfinished connection(s)", connections.len());
    }
    tracing::debug!("socket listener stopped");
}

async fn serve_connection(
    mut stream: UnixStream,
    handle: BackgroundHandle,
    cancel: CancellationToken,
) -> Result<()> {
    let request: SyncRequest =
        match tokio::time::timeout(READ_TIMEOUT, framing_async::read_message(&mut stream)).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::Protocol("client sent no request".to_string())),
        };

    if request == SyncRequest::WatchEvents {
        return stream_events(stream, handle.events(), cancel).await;
    }

    let response = match handle.request(request).await {
        Ok(response) => response,
        Err(e) => SyncResponse::Error {
            message: e.to_string(),
        },
    };
    framing_async::write_message(&mut stream, &response).await?;
    Ok(())
}

async fn stream_events(
    mut stream: UnixStream,
    mut events: broadcast::Receiver<SyncEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                let message = SyncResponse::Event { event };
                if framing_async::write_message(&mut stream, &message)
                    .await
                    .is_err()
                {
                    // Subscriber went away
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("event subscriber lagged by {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
