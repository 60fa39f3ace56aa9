// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is read from `till.toml`. Every field is optional:
//! - `state_dir`: where the queue database, daemon socket and logs live
//! - `[remote]`: base URL and prefix of the remote apply service
//! - `[probe]`: health-probe endpoint path, interval and abort timeout
//! - `[sync]`: retry cap and cross-context timeouts

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "till.toml";
const STORE_FILE_NAME: &str = "queue.db";
const SOCKET_FILE_NAME: &str = "tilld.sock";
const LOCK_FILE_NAME: &str = "tilld.lock";
const PID_FILE_NAME: &str = "tilld.pid";
const LOG_FILE_NAME: &str = "tilld.log";

/// Shortest drain lease handed out on an entity.
const MIN_LEASE_TTL: Duration = Duration::from_secs(120);

/// Top-level configuration stored in `till.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// State directory. `TILL_STATE_DIR` takes precedence when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub probe: ProbeConfig,
    pub sync: SyncConfig,
}

/// Remote apply service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Path prepended to every entity endpoint.
    pub api_prefix: String,
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: "http://localhost:8080".to_string(),
            api_prefix: "/api".to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Periodic reachability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Endpoint path, resolved against `remote.base_url`.
    pub path: String,
    pub interval_secs: u64,
    /// A probe that has not answered after this long counts as a failure.
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            path: "/api/health".to_string(),
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry policy and cross-context timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Transient failures tolerated before an operation moves to Failed.
    pub max_retries: u32,
    pub force_sync_timeout_secs: u64,
    pub status_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_retries: 5,
            force_sync_timeout_secs: 30,
            status_timeout_secs: 5,
        }
    }
}

impl SyncConfig {
    pub fn force_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.force_sync_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }
}

impl Config {
    /// How long a drain lease on an entity lasts before another context may
    /// take it over. Always outlives one remote request.
    pub fn lease_ttl(&self) -> Duration {
        (self.remote.request_timeout() * 4).max(MIN_LEASE_TTL)
    }

    /// Loads configuration from the given file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Loads configuration from the given file, or defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Parses and validates TOML content.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the given file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = &self.remote.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "invalid remote.base_url '{}': must start with http:// or https://",
                url
            )));
        }
        if self.sync.max_retries == 0 {
            return Err(Error::Config("sync.max_retries must be at least 1".to_string()));
        }
        let zero = [
            ("probe.interval_secs", self.probe.interval_secs),
            ("probe.timeout_secs", self.probe.timeout_secs),
            ("sync.force_sync_timeout_secs", self.sync.force_sync_timeout_secs),
            ("sync.status_timeout_secs", self.sync.status_timeout_secs),
            ("remote.request_timeout_secs", self.remote.request_timeout_secs),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, v)| *v == 0) {
            return Err(Error::Config(format!("{} must be greater than zero", name)));
        }
        Ok(())
    }

    /// URL of the health-probe endpoint.
    pub fn probe_url(&self) -> String {
        join_url(&self.remote.base_url, &self.probe.path)
    }

    /// Resolves the state directory.
    ///
    /// Precedence: `TILL_STATE_DIR`, then `state_dir` from the file, then
    /// `$XDG_STATE_HOME/till`, then `~/.local/state/till`.
    pub fn resolve_state_dir(&self) -> PathBuf {
        if let Some(dir) = env::state_dir() {
            return dir;
        }
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        if let Some(dir) = env::xdg_state_home() {
            return dir.join("till");
        }
        dirs::home_dir()
            .map(|h| h.join(".local/state/till"))
            .unwrap_or_else(|| PathBuf::from(".local/state/till"))
    }

    /// Resolved locations of every file under the state directory.
    pub fn paths(&self) -> StatePaths {
        StatePaths::new(self.resolve_state_dir())
    }
}

/// Default location of `till.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("till").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Files kept under the state directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub dir: PathBuf,
    pub store: PathBuf,
    pub socket: PathBuf,
    pub lock: PathBuf,
    pub pid: PathBuf,
    pub log: PathBuf,
}

impl StatePaths {
    pub fn new(dir: PathBuf) -> Self {
        StatePaths {
            store: dir.join(STORE_FILE_NAME),
            socket: dir.join(SOCKET_FILE_NAME),
            lock: dir.join(LOCK_FILE_NAME),
            pid: dir.join(PID_FILE_NAME),
            log: dir.join(LOG_FILE_NAME),
            dir,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
