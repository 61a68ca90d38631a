//! TOML configuration loading and validation.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the MP master file lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_model_path() -> String {
    "./data/model_portfolios/MP_Master.csv".into()
}

/// Where order tickets are written.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "./data/output".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Rebalancing defaults, overridable per run from the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceConfig {
    #[serde(default = "default_min_trade")]
    pub min_trade_usd: f64,
}

fn default_min_trade() -> f64 {
    100.0
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            min_trade_usd: default_min_trade(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.model.path.is_empty() {
            return Err(Error::Config("model.path must not be empty".into()));
        }
        if self.output.dir.is_empty() {
            return Err(Error::Config("output.dir must not be empty".into()));
        }
        if self.rebalance.min_trade_usd < 0.0 {
            return Err(Error::Config("rebalance.min_trade_usd must be >= 0".into()));
        }
        Ok(())
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> std::path::PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }

    /// Default minimum trade in cents.
    pub fn min_trade_cents(&self) -> i64 {
        (self.rebalance.min_trade_usd * 100.0).round() as i64
    }
}
