//! hs-auditor - HS tariff-code classifier with recursive verification
//!
//! Runs one classification, prints the report and exits 0. Any abort is
//! logged and exits 1 without a report.

mod cli;

use anyhow::{Context, Result};
use auditor::{AuditConfig, Backends, Orchestrator};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match run(&cli).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("[FATAL] Run aborted: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// RUST_LOG filter (default info), to stderr or the given file
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<String> {
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()[..8].to_string());

    let mut config = AuditConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.resolve_mode(cli.mode)?;
    info!(
        "[{}] hs-auditor v{} starting in {} mode",
        run_id,
        env!("CARGO_PKG_VERSION"),
        config.run.mode
    );

    let backends = Backends::from_config(&config).context("Failed to build backends")?;
    let orchestrator = Orchestrator::new(&config, backends);

    let outcome = orchestrator.run(&cli.query).await?;
    let report = outcome.report(&run_id, config.provider().cost_per_1k_tokens);
    info!(
        "[{}] Finished: {} ({})",
        run_id,
        report.final_code,
        if report.verified { "verified" } else { "unverified" }
    );

    if cli.json {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(report.render_text())
    }
}
