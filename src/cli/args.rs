//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for scriptlink-cli.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Scriptlink CLI - Ask questions about the EHR script registry
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "scriptlink-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Ask a single question and exit
    #[arg(short = 'e', long, conflicts_with = "file")]
    pub execute: Option<String>,

    /// Ask questions from a file (one per line) in one conversation and exit
    #[arg(short = 'f', long, conflicts_with = "execute")]
    pub file: Option<PathBuf>,

    /// Registry table (.xlsx, .xls, .ods, .csv); overrides settings
    #[arg(short = 'd', long)]
    pub data: Option<PathBuf>,

    /// Worksheet to read; overrides settings
    #[arg(long)]
    pub sheet: Option<String>,

    /// Settings file (default: ~/.scriptlink/settings.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Override language model provider from settings
    ///
    /// Options: gemini, openai, ollama
    #[arg(short = 'p', long)]
    pub provider: Option<String>,

    /// Override model from settings
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// API key (overrides settings and env vars)
    #[arg(long, env = "SCRIPTLINK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Seconds to wait for the language model on each turn
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print replies as JSON lines (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Run the HTTP server instead of a conversation
    #[cfg(feature = "server")]
    #[arg(long, conflicts_with_all = ["execute", "file"])]
    pub server: bool,

    /// Port for the HTTP server; overrides settings
    #[cfg(feature = "server")]
    #[arg(long, requires = "server")]
    pub port: Option<u16>,
}

impl Args {
    /// Per-turn timeout requested on the command line, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["scriptlink-cli"]);
        assert!(args.execute.is_none());
        assert!(args.data.is_none());
        assert!(!args.json);
        assert!(!args.verbose);
        assert!(args.timeout().is_none());
    }

    #[test]
    fn test_args_execute_flag() {
        let args = Args::parse_from(["scriptlink-cli", "-e", "how many scripts are on diagnosis"]);
        assert_eq!(
            args.execute,
            Some("how many scripts are on diagnosis".to_string())
        );
    }

    #[test]
    fn test_args_execute_conflicts_with_file() {
        let result = Args::try_parse_from(["scriptlink-cli", "-e", "hi", "-f", "questions.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_args_provider_and_model() {
        let args = Args::parse_from(["scriptlink-cli", "-p", "ollama", "-m", "qwen2.5"]);
        assert_eq!(args.provider, Some("ollama".to_string()));
        assert_eq!(args.model, Some("qwen2.5".to_string()));
    }

    #[test]
    fn test_args_data_and_timeout() {
        let args = Args::parse_from([
            "scriptlink-cli",
            "--data",
            "registry.csv",
            "--timeout-secs",
            "5",
            "--json",
        ]);
        assert_eq!(args.data, Some(PathBuf::from("registry.csv")));
        assert_eq!(args.timeout(), Some(Duration::from_secs(5)));
        assert!(args.json);
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_args_server_mode() {
        let args = Args::parse_from(["scriptlink-cli", "--server", "--port", "9000"]);
        assert!(args.server);
        assert_eq!(args.port, Some(9000));
    }
}
