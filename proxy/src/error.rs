//! Error types shared across the proxy core

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while reading configuration or resolving the topology.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write default config {path}: {source}")]
    WriteDefault {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("backend '{0}' has no host configured")]
    MissingHost(String),
    #[error("backend '{0}' is not configured")]
    UnknownBackend(String),
}

/// Failures loading or saving a persisted document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failure of the local half of a rank application.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("local grant task failed: {0}")]
    GrantTask(#[from] tokio::task::JoinError),
}

/// Why a single push to a backend did not succeed.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("backend answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for PushError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            PushError::Timeout
        } else {
            PushError::Transport(error.to_string())
        }
    }
}
