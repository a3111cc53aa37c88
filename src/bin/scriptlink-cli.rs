//! Scriptlink CLI - Ask questions about the EHR script registry
//!
//! # Usage
//!
//! ```bash
//! # Ask a single question
//! ./target/debug/scriptlink-cli --data Scriptlink.xlsx -e "how many scripts are on progress note forms?"
//!
//! # JSON output for scripting
//! ./target/debug/scriptlink-cli -e "list scripts on diagnosis" --json | jq .
//!
//! # Several questions in one conversation (follow-ups resolve)
//! ./target/debug/scriptlink-cli -f questions.txt
//!
//! # Interactive REPL mode (when no -e or -f provided)
//! ./target/debug/scriptlink-cli
//!
//! # HTTP server (requires the `server` feature)
//! ./target/debug/scriptlink-cli --server --port 8080
//! ```

use anyhow::Result;
use clap::Parser;

use scriptlink_lib::cli::{execute_batch, execute_once, initialize, run_repl, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    #[cfg(feature = "server")]
    if args.server {
        return scriptlink_lib::cli::server::serve(&args).await;
    }

    let mut ctx = initialize(&args).await?;

    if let Some(ref utterance) = args.execute {
        execute_once(&mut ctx, utterance).await.map(|_| ())
    } else if let Some(ref file) = args.file {
        execute_batch(&mut ctx, file).await
    } else {
        run_repl(&mut ctx).await
    }
}
