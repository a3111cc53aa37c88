//! Lightweight REPL (Read-Eval-Print-Loop) for scriptlink-cli.
//!
//! Provides an interactive mode when no question is provided via `-e` or `-f`.
//! Supports minimal commands:
//! - `/quit`, `/exit`, `/q` - Exit the REPL
//! - `/context` - Show what follow-up questions will refer to
//!
//! Any other input is a turn in the conversation.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use super::bootstrap::CliContext;
use super::output::print_context;
use super::runner::execute_once;

/// REPL command variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Exit the REPL
    Quit,
    /// Print the conversation context
    Context,
    /// Unknown command (will show help)
    Unknown(String),
    /// A question for the assistant
    Utterance(String),
    /// Empty input (skip)
    Empty,
}

impl ReplCommand {
    /// Parse user input into a REPL command.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }

        if trimmed.starts_with('/') {
            match trimmed.to_lowercase().as_str() {
                "/quit" | "/exit" | "/q" => ReplCommand::Quit,
                "/context" => ReplCommand::Context,
                _ => ReplCommand::Unknown(trimmed.to_string()),
            }
        } else {
            ReplCommand::Utterance(trimmed.to_string())
        }
    }
}

/// Run an interactive REPL session.
///
/// Returns when the user exits or on EOF (Ctrl+D).
pub async fn run_repl(ctx: &mut CliContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    eprintln!("scriptlink-cli interactive mode");
    eprintln!("Type /context to see the current topic, /quit to exit\n");

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            eprintln!("\nGoodbye!");
            break;
        }

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => {
                eprintln!("Goodbye!");
                break;
            }
            ReplCommand::Context => {
                print_context(&ctx.session.snapshot(), ctx.args.json)?;
            }
            ReplCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("Available: /context, /quit, /exit, /q");
            }
            ReplCommand::Utterance(utterance) => {
                if let Err(e) = execute_once(ctx, &utterance).await {
                    eprintln!("Error: {}", e);
                }

                println!();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_quit_aliases_case_insensitive() {
            for input in ["/quit", "/exit", "/q", "/QUIT", "/Exit", "/Q"] {
                assert_eq!(ReplCommand::parse(input), ReplCommand::Quit, "{}", input);
            }
        }

        #[test]
        fn parses_context_command() {
            assert_eq!(ReplCommand::parse("/context"), ReplCommand::Context);
            assert_eq!(ReplCommand::parse("  /Context \n"), ReplCommand::Context);
        }

        #[test]
        fn parses_unknown_slash_command() {
            assert_eq!(
                ReplCommand::parse("/help"),
                ReplCommand::Unknown("/help".to_string())
            );
        }

        #[test]
        fn parses_utterance() {
            assert_eq!(
                ReplCommand::parse("what scripts are on patient demographics?\n"),
                ReplCommand::Utterance("what scripts are on patient demographics?".to_string())
            );
        }

        #[test]
        fn slash_in_middle_is_not_a_command() {
            assert_eq!(
                ReplCommand::parse("scripts on PhD/PsyD notes"),
                ReplCommand::Utterance("scripts on PhD/PsyD notes".to_string())
            );
        }

        #[test]
        fn parses_empty_input() {
            assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
            assert_eq!(ReplCommand::parse("  \t\n"), ReplCommand::Empty);
        }
    }
}
