//! CLI argument parsing for the cb demo binary

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cb")]
#[command(author, version, about = "Request-coalescing batch scheduler demo", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit keys as independent callers and show how they were batched
    Run {
        /// Keys to submit (read one per line from stdin when omitted)
        keys: Vec<String>,

        /// Simulated worker latency in milliseconds
        #[arg(long, default_value = "10")]
        latency_ms: u64,

        /// Override delay between dispatch cycles
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Override maximum requests per worker call
        #[arg(long)]
        max_batch_size: Option<usize>,

        /// Override maximum unclaimed requests
        #[arg(long)]
        max_queue_size: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective batcher configuration
    Config,
}

/// Output format for `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::parse_from([
            "cb",
            "--log-level",
            "debug",
            "run",
            "a",
            "b",
            "--max-batch-size",
            "2",
            "--format",
            "json",
        ]);

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Run {
                keys,
                max_batch_size,
                latency_ms,
                format,
                ..
            } => {
                assert_eq!(keys, vec!["a", "b"]);
                assert_eq!(max_batch_size, Some(2));
                assert_eq!(latency_ms, 10);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
