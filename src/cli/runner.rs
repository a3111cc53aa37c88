//! CLI execution runner.
//!
//! Runs utterances through the context's single conversation, so a batch
//! file behaves like someone typing the same lines into the REPL.

use std::path::Path;

use anyhow::{Context, Result};

use crate::query::reply::Reply;

use super::bootstrap::CliContext;
use super::output::print_reply;

/// Run one turn and print the reply.
pub async fn execute_once(ctx: &mut CliContext, utterance: &str) -> Result<Reply> {
    let reply = ctx.service.handle_turn(&mut ctx.session, utterance).await;
    print_reply(&reply, ctx.args.json)?;
    Ok(reply)
}

/// Utterances in a batch file: one per line, `#` comments and blank lines
/// skipped.
pub fn parse_batch(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Execute utterances from a file, one per line, in order.
pub async fn execute_batch(ctx: &mut CliContext, file_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("Failed to read question file: {}", file_path.display()))?;

    let utterances = parse_batch(&content);
    if utterances.is_empty() {
        anyhow::bail!("No questions found in file: {}", file_path.display());
    }

    let total = utterances.len();
    let quiet = ctx.args.json;
    if !quiet {
        eprintln!("[batch] Asking {} question(s) from {}", total, file_path.display());
    }

    for (i, utterance) in utterances.iter().enumerate() {
        if !quiet {
            eprintln!("\n[batch] [{}/{}] {}", i + 1, total, truncate(utterance, 60));
        }
        execute_once(ctx, utterance).await?;
    }

    if !quiet {
        eprintln!("\n[batch] Done");
    }

    Ok(())
}

/// Truncate a string for display
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
