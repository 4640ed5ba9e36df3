// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::capture::DEFAULT_CAPTURE_CAPACITY;
use crate::remote::Credentials;
use crate::runner::RunnerSettings;

/// Configuration exactly as read from TOML, before validation.
///
/// ```toml
/// [ssh]
/// user = "deploy"
/// password = "secret"
/// connect_timeout_ms = 10000
///
/// [runner]
/// capture_buffer_bytes = 61440
/// exit_poll_interval_ms = 1000
/// exit_wait_timeout_ms = 30000
///
/// [store]
/// dir = ".remoterun"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub ssh: SshSection,

    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub store: StoreSection,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub ssh: SshSection,
    pub runner: RunnerSection,
    pub store: StoreSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(ssh: SshSection, runner: RunnerSection, store: StoreSection) -> Self {
        Self { ssh, runner, store }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.ssh.user.clone(),
            password: self.ssh.password.clone(),
            identity_file: self.ssh.identity_file.clone(),
            connect_timeout: Duration::from_millis(self.ssh.connect_timeout_ms),
            default_port: self.ssh.port,
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            credentials: self.credentials(),
            capture_capacity: self.runner.capture_buffer_bytes,
            exit_poll_interval: Duration::from_millis(self.runner.exit_poll_interval_ms),
            exit_wait_timeout: Duration::from_millis(self.runner.exit_wait_timeout_ms),
        }
    }
}

/// `[ssh]` section: how to log in to agents.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshSection {
    pub user: String,

    /// If set, logins go through `sshpass`; otherwise key-based auth.
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Port for agents that do not set their own.
    #[serde(default)]
    pub port: Option<u16>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    #[serde(default = "default_capture_buffer_bytes")]
    pub capture_buffer_bytes: usize,

    #[serde(default = "default_exit_poll_interval_ms")]
    pub exit_poll_interval_ms: u64,

    #[serde(default = "default_exit_wait_timeout_ms")]
    pub exit_wait_timeout_ms: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            capture_buffer_bytes: default_capture_buffer_bytes(),
            exit_poll_interval_ms: default_exit_poll_interval_ms(),
            exit_wait_timeout_ms: default_exit_wait_timeout_ms(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_capture_buffer_bytes() -> usize {
    DEFAULT_CAPTURE_CAPACITY
}

fn default_exit_poll_interval_ms() -> u64 {
    1_000
}

fn default_exit_wait_timeout_ms() -> u64 {
    30_000
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".remoterun")
}
