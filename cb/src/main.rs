//! cb - request-coalescing batch scheduler demo
//!
//! Submits keys as independent callers through a Batcher and reports how
//! they were grouped into worker calls.

use std::convert::Infallible;
use std::io::{self, BufRead, IsTerminal};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use coalesce::cli::{Cli, Command, OutputFormat};
use coalesce::config::Config;
use coalesce::{Batcher, BatcherConfig, worker_fn};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("{}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[derive(Debug, Serialize)]
struct KeyResult {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    results: Vec<KeyResult>,
    batches: Vec<usize>,
    coalesced: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            keys,
            latency_ms,
            delay_ms,
            max_batch_size,
            max_queue_size,
            format,
        } => {
            let batcher_config = BatcherConfig {
                delay_ms: delay_ms.unwrap_or(config.batcher.delay_ms),
                max_batch_size: max_batch_size.unwrap_or(config.batcher.max_batch_size),
                max_queue_size: max_queue_size.unwrap_or(config.batcher.max_queue_size),
            };
            batcher_config.validate().context("Invalid batcher options")?;

            let keys = if keys.is_empty() { read_stdin_keys()? } else { keys };
            let report = cmd_run(keys, batcher_config, Duration::from_millis(latency_ms)).await;
            print_report(&report, format)?;
        }
        Command::Config => {
            let yaml = serde_yaml::to_string(&config.batcher).context("Failed to serialize config")?;
            print!("{}", yaml);
        }
    }

    Ok(())
}

fn read_stdin_keys() -> Result<Vec<String>> {
    debug!("read_stdin_keys: called");
    let mut keys = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read keys from stdin")?;
        let key = line.trim();
        if !key.is_empty() {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

async fn cmd_run(keys: Vec<String>, config: BatcherConfig, latency: Duration) -> RunReport {
    debug!(count = keys.len(), ?config, ?latency, "cmd_run: called");
    let batches = Arc::new(Mutex::new(Vec::new()));

    let recorder = batches.clone();
    let worker = worker_fn("upper", move |args: Vec<String>| {
        let batches = recorder.clone();
        async move {
            batches.lock().unwrap_or_else(|e| e.into_inner()).push(args.len());
            tokio::time::sleep(latency).await;
            Ok::<_, Infallible>(args.iter().map(|a| a.to_uppercase()).collect::<Vec<_>>())
        }
    });
    let batcher = Batcher::new(worker, config);

    // One task per key, as independent callers would submit
    let handles: Vec<_> = keys
        .into_iter()
        .map(|key| {
            let batcher = batcher.clone();
            let submitted = key.clone();
            let handle = tokio::spawn(async move {
                match batcher.submit(submitted) {
                    Ok(outcome) => outcome.await,
                    Err(e) => Err(e),
                }
            });
            (key, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (key, handle) in handles {
        results.push(match handle.await {
            Ok(Ok(value)) => KeyResult {
                key,
                value: Some(value),
                error: None,
            },
            Ok(Err(e)) => KeyResult {
                key,
                value: None,
                error: Some(e.to_string()),
            },
            Err(e) => KeyResult {
                key,
                value: None,
                error: Some(format!("Caller task failed: {}", e)),
            },
        });
    }

    let batches = batches.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let processed: usize = batches.iter().sum();
    let admitted = results.iter().filter(|r| r.value.is_some()).count();
    info!(batches = batches.len(), processed, "cmd_run: finished");

    RunReport {
        coalesced: admitted.saturating_sub(processed),
        results,
        batches,
    }
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for r in &report.results {
                match (&r.value, &r.error) {
                    (Some(value), _) => println!("{} {} -> {}", "✓".green(), r.key, value.cyan()),
                    (None, Some(error)) => println!("{} {} -> {}", "✗".red(), r.key, error.red()),
                    (None, None) => println!("{} {}", "?".yellow(), r.key),
                }
            }
            let sizes: Vec<String> = report.batches.iter().map(|s| s.to_string()).collect();
            println!("Batches: {}", report.batches.len());
            println!("  Sizes: {}", sizes.join(", "));
            println!("  Coalesced: {}", report.coalesced);
        }
    }
    Ok(())
}
