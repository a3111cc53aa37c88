//! CLI output rendering.
//!
//! Terminal mode prints the reply as the user would read it (tables as an
//! aligned grid under `Results:`). JSON mode prints one wire-form object per
//! line, the same shape the HTTP server returns.

use std::io::{self, Write};

use anyhow::Result;

use crate::query::context::ContextSnapshot;
use crate::query::reply::Reply;

/// Print a reply to stdout.
pub fn print_reply(reply: &Reply, json_mode: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write_reply(&mut stdout, reply, json_mode)?;
    stdout.flush()?;
    Ok(())
}

/// Print a context snapshot to stdout.
pub fn print_context(snapshot: &ContextSnapshot, json_mode: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write_context(&mut stdout, snapshot, json_mode)?;
    stdout.flush()?;
    Ok(())
}

pub fn write_reply<W: Write>(out: &mut W, reply: &Reply, json_mode: bool) -> Result<()> {
    if json_mode {
        writeln!(out, "{}", serde_json::to_string(&reply.to_body())?)?;
    } else {
        writeln!(out, "{}", reply.render())?;
    }
    Ok(())
}

pub fn write_context<W: Write>(out: &mut W, snapshot: &ContextSnapshot, json_mode: bool) -> Result<()> {
    if json_mode {
        writeln!(out, "{}", serde_json::to_string(snapshot)?)?;
        return Ok(());
    }

    match &snapshot.primary_entity {
        Some(entity) => writeln!(out, "Primary entity: {} = '{}'", entity.kind, entity.value)?,
        None => writeln!(out, "Primary entity: none")?,
    }
    match (&snapshot.last_operation, snapshot.has_replayable_plan) {
        (Some(operation), true) => writeln!(out, "Replayable plan: {}", operation)?,
        (None, true) => writeln!(out, "Replayable plan: yes")?,
        (_, false) => writeln!(out, "Replayable plan: none")?,
    }
    Ok(())
}
