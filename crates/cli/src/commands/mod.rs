// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod daemon;
pub mod enqueue;
pub mod failed;
pub mod register;
pub mod status;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// Write `value` as pretty JSON followed by a newline.
pub(crate) fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
