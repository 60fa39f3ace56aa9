// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote apply: the one interface the engine consumes.
//!
//! Every operation maps to one HTTP call. The outcome is success, a
//! transient failure (retry on a later pass) or a permanent rejection
//! (move to Failed). Callers must tolerate duplicate delivery of the same
//! operation id.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use reqwest::Url;

use till_core::{OpType, PendingOperation};

use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// Why a remote apply did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// Timeout, network error, 5xx, 408 or 429. Retried on the next pass.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Semantic or validation rejection. Never retried automatically.
    #[error("permanent rejection: {0}")]
    Permanent(String),
}

/// Result of one remote apply.
pub type ApplyResult = std::result::Result<(), ApplyError>;

/// Applies queued operations against the authoritative store.
pub trait RemoteApply: Send + Sync {
    fn apply<'a>(
        &'a self,
        op: &'a PendingOperation,
    ) -> Pin<Box<dyn Future<Output = ApplyResult> + Send + 'a>>;
}

/// HTTP method derived from the operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn for_op(op_type: OpType) -> Self {
        match op_type {
            OpType::Create => HttpMethod::Post,
            OpType::Update => HttpMethod::Put,
            OpType::Delete => HttpMethod::Delete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved target of a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub url: Url,
}

/// Resolve the endpoint for `op`.
///
/// Create posts to the collection; Update and Delete address the entity by
/// the payload's `id`. A missing id on Update or Delete can never succeed and
/// is reported as permanent.
pub fn resolve_endpoint(
    base: &Url,
    api_prefix: &str,
    op: &PendingOperation,
) -> std::result::Result<Endpoint, ApplyError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ApplyError::Permanent(format!("base url '{}' cannot hold a path", base)))?;
        segments.pop_if_empty();
        segments.extend(api_prefix.split('/').filter(|s| !s.is_empty()));
        segments.push(&op.entity_kind);
        if op.op_type != OpType::Create {
            let id = op.entity_id().ok_or_else(|| {
                ApplyError::Permanent(format!(
                    "{} on {} has no entity id in its payload",
                    op.op_type, op.entity_kind
                ))
            })?;
            segments.push(&id);
        }
    }
    Ok(Endpoint {
        method: HttpMethod::for_op(op.op_type),
        url,
    })
}

/// Classify a response status. `None` means success.
pub fn classify_status(status: u16) -> Option<ApplyError> {
    match status {
        200..=299 => None,
        408 | 429 => Some(ApplyError::Transient(format!("remote returned {}", status))),
        400..=499 => Some(ApplyError::Permanent(format!("remote rejected with {}", status))),
        _ => Some(ApplyError::Transient(format!("remote returned {}", status))),
    }
}

/// Remote apply over HTTP.
pub struct HttpRemote {
    client: reqwest::Client,
    base: Url,
    api_prefix: String,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid remote.base_url '{}': {}", config.base_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("till/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpRemote {
            client,
            base,
            api_prefix: config.api_prefix.clone(),
        })
    }
}

impl RemoteApply for HttpRemote {
    fn apply<'a>(
        &'a self,
        op: &'a PendingOperation,
    ) -> Pin<Box<dyn Future<Output = ApplyResult> + Send + 'a>> {
        Box::pin(async move {
            let endpoint = resolve_endpoint(&self.base, &self.api_prefix, op)?;
            tracing::debug!("{} {} ({})", endpoint.method, endpoint.url, op.id);

            let mut request = self
                .client
                .request(endpoint.method.to_reqwest(), endpoint.url)
                .header("Idempotency-Key", &op.id);
            if op.op_type.has_body() {
                request = request.json(&op.payload);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_builder() {
                    ApplyError::Permanent(e.to_string())
                } else {
                    ApplyError::Transient(e.to_string())
                }
            })?;

            match classify_status(response.status().as_u16()) {
                None => Ok(()),
                Some(err) => Err(err),
            }
        })
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
