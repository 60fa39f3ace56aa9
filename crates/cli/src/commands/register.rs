// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use crate::error::{Error, Result};
use crate::session::{Backend, Session};

/// Register tilld for automatic drains on reconnect.
///
/// An in-process background context exits with the command, so registering
/// it would have no lasting effect.
pub async fn run(session: &Session, tag: &str, out: &mut impl Write) -> Result<()> {
    if session.backend() == Backend::InProcess {
        return Err(Error::Daemon(
            "tilld is not running\n  hint: start it with 'till daemon start'".to_string(),
        ));
    }
    let tags = session.coordinator().register_background_sync(tag).await?;
    writeln!(out, "Registered: {}", tags.join(", "))?;
    Ok(())
}

#[cfg(test)]
#[path = "register_tests.rs"]
mod tests;
