//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap.

use auditor::DeploymentMode;
use clap::Parser;
use std::path::PathBuf;

/// HS tariff-code auditor
#[derive(Parser, Debug)]
#[command(name = "hs-auditor")]
#[command(about = "Classify a product description into a verified HS tariff code", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Free-text product description
    pub query: String,

    /// Run identifier (defaults to a short random id)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Config file (overrides ./hs-auditor.toml and /etc/hs-auditor/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Deployment mode: cloud or local (overrides $HS_AUDITOR_MODE and the config file)
    #[arg(long)]
    pub mode: Option<DeploymentMode>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "hs-auditor",
            "wireless headphones",
            "--run-id",
            "abc12345",
            "--mode",
            "local",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.query, "wireless headphones");
        assert_eq!(cli.run_id.as_deref(), Some("abc12345"));
        assert_eq!(cli.mode, Some(DeploymentMode::Local));
        assert!(cli.json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_rejects_unknown_mode_and_missing_query() {
        assert!(Cli::try_parse_from(["hs-auditor", "chairs", "--mode", "edge"]).is_err());
        assert!(Cli::try_parse_from(["hs-auditor"]).is_err());
    }
}
