//! Error types for the order generator.

use std::path::PathBuf;

/// All errors that can occur during order generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("model portfolio data error: {0}")]
    DataFormat(String),

    #[error("failed to read model portfolio file {path}: {source}")]
    ModelRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid scenario: {0}")]
    Scenario(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("failed to read snapshot file {path}: {source}")]
    SnapshotRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse snapshot JSON: {0}")]
    SnapshotParse(#[from] serde_json::Error),

    #[error("order ticket error: {0}")]
    Ticket(String),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
