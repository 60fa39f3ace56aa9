// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use till_core::OpType;

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn op_type(s: &str) -> Result<OpType, String> {
    s.parse().map_err(|e: till_core::Error| e.to_string())
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "till")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline operation queue and sync for the point of sale")]
#[command(
    long_about = "Offline operation queue and sync for the point of sale.\n\n\
    Mutations are recorded locally and replayed against the API in order once the \
    terminal is online. Talks to tilld when it is running, otherwise syncs in-process."
)]
pub struct Cli {
    /// Config file (default: ~/.config/till/till.toml)
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// State directory holding queue.db and the tilld socket
    #[arg(long = "state-dir", global = true, value_name = "path")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a mutation for later replay
    #[command(after_help = "\
Examples:
  till enqueue create sales '{\"id\":\"s1\",\"total\":12}'
  till enqueue update products '{\"id\":\"p7\",\"stock\":3}'
  till enqueue delete customers '{\"id\":\"c2\"}'")]
    Enqueue {
        /// Operation type (create, update, delete)
        #[arg(value_parser = op_type)]
        op_type: OpType,

        /// Entity kind, e.g. sales, products, customers
        #[arg(value_parser = non_empty_string)]
        kind: String,

        /// JSON payload; Update and Delete need an "id" field
        payload: String,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show connection, queue and last sync
    Status {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Drain the queue now
    Sync {
        /// Drain in this process instead of asking the background context
        #[arg(long)]
        local: bool,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List operations that will not be retried automatically
    Failed {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Put failed operation(s) back in the queue with a fresh retry budget
    #[command(arg_required_else_help = true)]
    Resubmit {
        /// Operation ID(s)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Drop failed operation(s) without replaying them
    #[command(arg_required_else_help = true)]
    Discard {
        /// Operation ID(s)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Register the background context for automatic drains on reconnect
    Register {
        /// Registration tag
        #[arg(default_value = "pos-sync", value_parser = non_empty_string)]
        tag: String,
    },

    /// Manage the tilld background process
    #[command(subcommand)]
    Daemon(DaemonCommand),
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Start tilld if it is not running
    Start,
    /// Stop tilld
    Stop,
    /// Show whether tilld is running
    Status,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
