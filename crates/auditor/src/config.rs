//! Configuration management for hs-auditor.
//!
//! Loads settings from ./hs-auditor.toml or /etc/hs-auditor/config.toml, or
//! uses defaults. The deployment mode is resolved here once; nothing below the
//! orchestrator constructor looks at it.

use audit_shared::AuditError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Config file in the working directory
pub const LOCAL_CONFIG_PATH: &str = "hs-auditor.toml";

/// System-wide config file
pub const CONFIG_PATH: &str = "/etc/hs-auditor/config.toml";

/// Environment variable overriding the deployment mode
pub const MODE_ENV: &str = "HS_AUDITOR_MODE";

/// Which backend family serves the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Rate-limited hosted API
    #[default]
    Cloud,
    /// Locally hosted models
    Local,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Cloud => write!(f, "cloud"),
            DeploymentMode::Local => write!(f, "local"),
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud" => Ok(DeploymentMode::Cloud),
            "local" => Ok(DeploymentMode::Local),
            other => Err(format!("unknown mode '{}', expected cloud or local", other)),
        }
    }
}

/// Loop and gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub mode: DeploymentMode,

    /// Retry ceiling on step_count
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Minimum faithfulness score for approval
    #[serde(default = "default_faithfulness_threshold")]
    pub faithfulness_threshold: f64,

    /// Character budget for raw evidence handed to the worker
    #[serde(default = "default_evidence_char_limit")]
    pub evidence_char_limit: usize,

    /// Scoring attempts before falling back to 0.0
    #[serde(default = "default_scorer_attempts")]
    pub scorer_attempts: u32,

    /// Cooldown before each retry; defaults per mode when unset
    #[serde(default)]
    pub cooldown_secs: Option<u64>,

    /// Directory with prompt overrides (strategy.md, final_synthesis.md)
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
}

fn default_max_steps() -> u32 {
    3
}

fn default_faithfulness_threshold() -> f64 {
    audit_shared::DEFAULT_FAITHFULNESS_THRESHOLD
}

fn default_evidence_char_limit() -> usize {
    5_000
}

fn default_scorer_attempts() -> u32 {
    3
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::default(),
            max_steps: default_max_steps(),
            faithfulness_threshold: default_faithfulness_threshold(),
            evidence_char_limit: default_evidence_char_limit(),
            scorer_attempts: default_scorer_attempts(),
            cooldown_secs: None,
            prompts_dir: None,
        }
    }
}

/// One generation provider and its per-role models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,

    /// Env var holding the API key (hosted providers only)
    #[serde(default)]
    pub api_key_env: Option<String>,

    pub planner_model: String,
    pub worker_model: String,
    pub aggregator_model: String,

    /// Model grading faithfulness
    pub judge_model: String,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// USD per 1000 tokens, for the report
    #[serde(default)]
    pub cost_per_1k_tokens: f64,
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_cloud() -> ProviderConfig {
    ProviderConfig {
        base_url: "https://api.groq.com/openai/v1".to_string(),
        api_key_env: Some("GROQ_API_KEY".to_string()),
        planner_model: "llama-3.3-70b-versatile".to_string(),
        worker_model: "llama-3.3-70b-versatile".to_string(),
        aggregator_model: "llama-3.3-70b-versatile".to_string(),
        judge_model: "llama-3.1-8b-instant".to_string(),
        timeout_secs: default_generation_timeout(),
        cost_per_1k_tokens: 0.0006,
    }
}

fn default_local() -> ProviderConfig {
    ProviderConfig {
        base_url: "http://127.0.0.1:11434".to_string(),
        api_key_env: None,
        planner_model: "qwen2.5:7b-instruct".to_string(),
        worker_model: "qwen2.5:7b-instruct".to_string(),
        aggregator_model: "qwen2.5:7b-instruct".to_string(),
        judge_model: "qwen2.5:7b-instruct".to_string(),
        timeout_secs: default_generation_timeout(),
        cost_per_1k_tokens: 0.0,
    }
}

/// Retrieval service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_evidence_url")]
    pub url: String,

    /// Chunks requested per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_evidence_timeout")]
    pub timeout_secs: u64,
}

fn default_evidence_url() -> String {
    "http://127.0.0.1:8600".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_evidence_timeout() -> u64 {
    30
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            url: default_evidence_url(),
            top_k: default_top_k(),
            timeout_secs: default_evidence_timeout(),
        }
    }
}

/// Full auditor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default = "default_cloud")]
    pub cloud: ProviderConfig,

    #[serde(default = "default_local")]
    pub local: ProviderConfig,

    #[serde(default)]
    pub evidence: EvidenceConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            cloud: default_cloud(),
            local: default_local(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl AuditConfig {
    /// Load config: explicit path (must exist), else the usual locations, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, AuditError> {
        let config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_path(Path::new(LOCAL_CONFIG_PATH))
                .or_else(|_| Self::load_from_path(Path::new(CONFIG_PATH)))
                .unwrap_or_else(|e| {
                    warn!("Config not found, using defaults: {}", e);
                    AuditConfig::default()
                }),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, AuditError> {
        let content = fs::read_to_string(path)?;
        let config: AuditConfig = toml::from_str(&content)
            .map_err(|e| AuditError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply mode overrides: CLI flag first, then the environment
    pub fn resolve_mode(&mut self, cli: Option<DeploymentMode>) -> Result<(), AuditError> {
        if let Some(mode) = cli {
            self.run.mode = mode;
            return Ok(());
        }
        if let Ok(value) = std::env::var(MODE_ENV) {
            self.run.mode = value.parse().map_err(AuditError::Config)?;
        }
        Ok(())
    }

    /// Reject values the state machine cannot run with
    pub fn validate(&self) -> Result<(), AuditError> {
        let run = &self.run;
        if !(0.0..=1.0).contains(&run.faithfulness_threshold) {
            return Err(AuditError::Config(format!(
                "faithfulness_threshold must be within [0, 1], got {}",
                run.faithfulness_threshold
            )));
        }
        if run.max_steps == 0 {
            return Err(AuditError::Config("max_steps must be at least 1".to_string()));
        }
        if run.scorer_attempts == 0 {
            return Err(AuditError::Config(
                "scorer_attempts must be at least 1".to_string(),
            ));
        }
        if run.evidence_char_limit == 0 {
            return Err(AuditError::Config(
                "evidence_char_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Provider block for the active mode
    pub fn provider(&self) -> &ProviderConfig {
        match self.run.mode {
            DeploymentMode::Cloud => &self.cloud,
            DeploymentMode::Local => &self.local,
        }
    }

    /// Cooldown between attempts for the active mode
    pub fn cooldown(&self) -> Duration {
        let secs = self.run.cooldown_secs.unwrap_or(match self.run.mode {
            DeploymentMode::Cloud => 10,
            DeploymentMode::Local => 0,
        });
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.run.mode, DeploymentMode::Cloud);
        assert_eq!(config.run.max_steps, 3);
        assert_eq!(config.run.faithfulness_threshold, 0.75);
        assert_eq!(config.run.evidence_char_limit, 5_000);
        assert_eq!(config.run.scorer_attempts, 3);
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_mode_has_no_cooldown() {
        let mut config = AuditConfig::default();
        config.run.mode = DeploymentMode::Local;
        assert_eq!(config.cooldown(), Duration::ZERO);
        assert_eq!(config.provider().base_url, "http://127.0.0.1:11434");
        assert_eq!(config.provider().cost_per_1k_tokens, 0.0);
    }

    #[test]
    fn test_cooldown_override() {
        let mut config = AuditConfig::default();
        config.run.cooldown_secs = Some(2);
        assert_eq!(config.cooldown(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[run]
mode = "local"
max_steps = 2

[local]
base_url = "http://gpu-box:11434"
planner_model = "llama3.1:8b"
worker_model = "llama3.1:8b"
aggregator_model = "llama3.1:8b"
judge_model = "llama3.1:8b"
"#;
        let config: AuditConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.run.mode, DeploymentMode::Local);
        assert_eq!(config.run.max_steps, 2);
        assert_eq!(config.local.base_url, "http://gpu-box:11434");
        // Defaults for missing fields
        assert_eq!(config.local.timeout_secs, 120);
        assert_eq!(config.run.faithfulness_threshold, 0.75);
        assert_eq!(config.cloud.api_key_env.as_deref(), Some("GROQ_API_KEY"));
        assert_eq!(config.evidence.top_k, 5);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AuditConfig::default();
        config.run.faithfulness_threshold = 1.5;
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let mut config = AuditConfig::default();
        config.run.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_mode_wins() {
        let mut config = AuditConfig::default();
        config.resolve_mode(Some(DeploymentMode::Local)).unwrap();
        assert_eq!(config.run.mode, DeploymentMode::Local);
    }

    // Single test so no other test observes MODE_ENV mid-change
    #[test]
    fn test_mode_override_order() {
        std::env::remove_var(MODE_ENV);
        let file_config: AuditConfig = toml::from_str("[run]\nmode = \"cloud\"").unwrap();

        // No overrides: the file decides
        let mut config = file_config.clone();
        config.resolve_mode(None).unwrap();
        assert_eq!(config.run.mode, DeploymentMode::Cloud);

        // Environment beats the file
        std::env::set_var(MODE_ENV, "local");
        let mut config = file_config.clone();
        config.resolve_mode(None).unwrap();
        assert_eq!(config.run.mode, DeploymentMode::Local);

        // CLI beats the environment
        std::env::set_var(MODE_ENV, "local");
        let mut config = file_config.clone();
        config.resolve_mode(Some(DeploymentMode::Cloud)).unwrap();
        assert_eq!(config.run.mode, DeploymentMode::Cloud);

        // An invalid environment value is a config error, unless the CLI overrides it
        std::env::set_var(MODE_ENV, "edge");
        let mut config = file_config.clone();
        assert!(matches!(config.resolve_mode(None), Err(AuditError::Config(_))));
        let mut config = file_config.clone();
        assert!(config.resolve_mode(Some(DeploymentMode::Local)).is_ok());

        std::env::remove_var(MODE_ENV);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("LOCAL".parse::<DeploymentMode>(), Ok(DeploymentMode::Local));
        assert_eq!(" cloud ".parse::<DeploymentMode>(), Ok(DeploymentMode::Cloud));
        assert!("edge".parse::<DeploymentMode>().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\nfaithfulness_threshold = 0.8").unwrap();

        let config = AuditConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.run.faithfulness_threshold, 0.8);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let result = AuditConfig::load(Some(Path::new("/nonexistent/hs-auditor.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_invalid_values_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\nscorer_attempts = 0").unwrap();
        assert!(AuditConfig::load(Some(file.path())).is_err());
    }
}
