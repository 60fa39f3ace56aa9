// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tilld - The till background sync context.
//!
//! Owns a background drain loop over the shared operation store at
//! `~/.local/state/till/queue.db` and answers REGISTER_SYNC, FORCE_SYNC and
//! GET_SYNC_STATUS from `till` processes over a Unix socket.
//!
//! Usage:
//!   tilld [--state-dir <path>] [--config <path>]

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixListener;

use till_core::{ConnectionStatus, OperationStore, SqliteStore};
use tillsync::channel::serve;
use tillsync::config::default_config_path;
use tillsync::{BackgroundContext, Config, HttpProbe, HttpRemote, StatePaths};

mod args;

use args::DaemonArgs;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let args = DaemonArgs::parse(&args);

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = match Config::load_or_default(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("tilld: {}", e);
            std::process::exit(1);
        }
    };
    let paths = match &args.state_dir {
        Some(dir) => StatePaths::new(dir.clone()),
        None => config.paths(),
    };
    if let Err(e) = fs::create_dir_all(&paths.dir) {
        eprintln!("tilld: cannot create {}: {}", paths.dir.display(), e);
        std::process::exit(1);
    }

    setup_logging(&paths.log);
    tracing::info!("tilld starting, state_dir={}", paths.dir.display());

    // Single instance per state directory
    let lock_file = match acquire_lock(&paths.lock) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to acquire lock: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = write_pid_file(&paths.pid) {
        tracing::error!("failed to write PID file: {}", e);
        std::process::exit(1);
    }

    let context = match build_context(&config, &paths) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!("failed to start background context: {}", e);
            cleanup(&paths);
            std::process::exit(1);
        }
    };

    // Remove stale socket if it exists
    let _ = fs::remove_file(&paths.socket);
    let listener = match UnixListener::bind(&paths.socket) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind socket: {}", e);
            cleanup(&paths);
            std::process::exit(1);
        }
    };
    tracing::info!("listening on {}", paths.socket.display());

    let handle = context.spawn();
    let server = tokio::spawn(serve(listener, handle.clone(), handle.cancel_token()));

    // Signal readiness to parent process
    println!("READY");
    let _ = std::io::stdout().flush();

    let cancel = handle.cancel_token();
    tokio::select! {
        _ = cancel.cancelled() => tracing::info!("shutdown requested"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            handle.shutdown();
        }
    }

    handle.join().await;
    if let Err(e) = server.await {
        tracing::warn!("socket server task failed: {}", e);
    }

    cleanup(&paths);
    drop(lock_file);
    tracing::info!("tilld stopped");
}

fn build_context(config: &Config, paths: &StatePaths) -> tillsync::Result<BackgroundContext> {
    let store: Arc<dyn OperationStore> = Arc::new(SqliteStore::open(&paths.store)?);
    let remote = Arc::new(HttpRemote::new(&config.remote)?);
    let probe = Arc::new(HttpProbe::new(config)?);
    // The first probe decides; nothing is replayed before it succeeds
    Ok(BackgroundContext::new(
        config,
        store,
        remote,
        probe,
        ConnectionStatus::offline(),
    ))
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Try to open log file, fall back to stderr
    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> std::io::Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::other("another tilld instance is already running"))?;
    Ok(file)
}

fn write_pid_file(pid_path: &Path) -> std::io::Result<()> {
    fs::write(pid_path, format!("{}", std::process::id()))
}

fn cleanup(paths: &StatePaths) {
    let _ = fs::remove_file(&paths.pid);
    let _ = fs::remove_file(&paths.socket);
}
