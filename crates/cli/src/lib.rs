// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tillcli - the `till` operator command line.
//!
//! Records mutations in the offline queue and drives the sync engine from
//! `tillsync`: status, forced drains, and recovery of failed operations.

mod cli;
mod commands;
mod daemon;
mod session;

pub mod error;

pub use cli::{Cli, Command, DaemonCommand, OutputFormat};
pub use error::{Error, Result};
pub use session::{Backend, Session};

use std::io::Write;

use tillsync::config::default_config_path;
use tillsync::{Config, StatePaths};

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)?;
    let paths = match &cli.state_dir {
        Some(dir) => StatePaths::new(dir.clone()),
        None => config.paths(),
    };
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Daemon(command) => {
            commands::daemon::run(command, &paths, cli.config.as_deref(), &mut out)
        }
        command => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let probe = needs_network(&command);
            let session = runtime.block_on(Session::open(&config, &paths, probe))?;
            let result = runtime.block_on(dispatch(command, &session, &mut out));
            runtime.block_on(session.close());
            result
        }
    }
}

/// Commands that read or change remote state probe reachability first.
fn needs_network(command: &Command) -> bool {
    matches!(
        command,
        Command::Status { .. } | Command::Sync { .. } | Command::Register { .. }
    )
}

async fn dispatch(command: Command, session: &Session, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Enqueue {
            op_type,
            kind,
            payload,
            output,
        } => commands::enqueue::run(session, op_type, &kind, &payload, output, out).await,
        Command::Status { output } => commands::status::run(session, output, out).await,
        Command::Sync { local, output } => commands::sync::run(session, local, output, out).await,
        Command::Failed { output } => commands::failed::list(session, output, out).await,
        Command::Resubmit { ids } => commands::failed::resubmit(session, &ids, out).await,
        Command::Discard { ids } => commands::failed::discard(session, &ids, out).await,
        Command::Register { tag } => commands::register::run(session, &tag, out).await,
        Command::Daemon(_) => Err(Error::Daemon(
            "daemon commands run without a sync session".to_string(),
        )),
    }
}
