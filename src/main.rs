mod backoff;
mod client;
mod poller;
mod state;
mod ui;

use crate::client::{HttpEndpoint, StatusEndpoint};
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://127.0.0.1:5000";

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Base URL of the server exposing /progress and /results.
    /// If omitted, the PROGRESSWATCH_URL env var will be used as a fallback.
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Print percent lines to stdout (default is the full-screen gauge)
    #[arg(long)]
    pipe: bool,
    /// Delay between poll cycles, in milliseconds (must be at least 1;
    /// this is also the base of the retry backoff schedule)
    #[arg(
        long,
        value_name = "MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,
    /// Write the retrieved results document to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<std::path::PathBuf>,
    /// Enable backend debug logging to stderr
    #[arg(long)]
    pub debug_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            pipe: false,
            interval_ms: 1000,
            output: None,
            debug_log: false,
        }
    }
}

fn url_from_env_if_unset(cli: &mut Config) {
    if cli.url.is_none()
        && let Ok(s) = std::env::var("PROGRESSWATCH_URL")
    {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cli.url = Some(trimmed.to_string());
        }
    }
}

fn init_logging(debug_log: bool) {
    let filter = if debug_log {
        EnvFilter::new("progresswatch=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    url_from_env_if_unset(&mut cfg);
    init_logging(cfg.debug_log);

    let base = cfg.url.clone().unwrap_or_else(|| DEFAULT_URL.to_string());
    let endpoint = HttpEndpoint::new(&base);
    let poll_interval = Duration::from_millis(cfg.interval_ms);

    // Probe once before starting the UI so an unreachable server shows up
    // immediately in the log; the loop itself tolerates and retries errors.
    if let Err(e) = endpoint.fetch_progress().await {
        tracing::warn!(error = %e, url = %base, "initial progress probe failed");
    }

    let result = if cfg.pipe {
        crate::ui::pipe::run_pipe(endpoint, poll_interval).await
    } else {
        crate::ui::modern::run_modern(endpoint, poll_interval).await
    };

    // Print error if any, for better diagnostics
    match result {
        Ok(Some(body)) => write_results(&cfg, &body)?,
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e);
        }
    }
    Ok(())
}

fn write_results(cfg: &Config, body: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    match &cfg.output {
        Some(path) => {
            std::fs::write(path, body)?;
            tracing::info!(path = %path.display(), "results written");
        }
        None => {
            println!("{}", body);
        }
    }
    Ok(())
}
