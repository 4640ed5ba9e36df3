// src/errors.rs

//! Crate-wide error types.

use thiserror::Error;

use crate::types::ExecStatus;

/// Failures of the remote shell transport.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Authentication failed for {user}@{host}: {reason}")]
    Auth {
        user: String,
        host: String,
        reason: String,
    },

    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("Exit status not available after {waited_ms} ms")]
    ExitStatusUnavailable { waited_ms: u128 },

    #[error("Remote IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the record/catalog repository.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: ExecStatus, to: ExecStatus },

    #[error("Record {0} has no {1} reference")]
    MissingReference(String, &'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
