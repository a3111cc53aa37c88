//! Command-line front end for the Scriptlink assistant.
//!
//! ```text
//! +-----------+     +-------------------------+     +-----------+
//! | args.rs   | --> | bootstrap.rs            | --> | runner.rs |
//! | (clap)    |     | settings, table, model  |     | repl.rs   |
//! +-----------+     +-------------------------+     +-----------+
//!                                                        |
//!                                                        v
//!                                                  output.rs (text / JSON)
//! ```
//!
//! # REPL Mode
//!
//! When no question is provided via `-e` or `-f`, the CLI enters
//! interactive REPL mode. See `repl.rs` for details.
//!
//! # Server Mode
//!
//! With the `server` feature, `--server` exposes the same turn pipeline over
//! HTTP. See `server/mod.rs`.

mod args;
mod bootstrap;
mod output;
mod repl;
mod runner;

#[cfg(feature = "server")]
pub mod server;

pub use args::Args;
pub use bootstrap::{initialize, initialize_service, CliContext};
pub use output::{print_context, print_reply};
pub use repl::run_repl;
pub use runner::{execute_batch, execute_once};
