// src/config/validate.rs

use crate::capture::READ_BLOCK_SIZE;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RunnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.ssh, raw.runner, raw.store))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_ssh(cfg)?;
    validate_runner(cfg)?;
    Ok(())
}

fn validate_ssh(cfg: &RawConfigFile) -> Result<()> {
    if cfg.ssh.user.trim().is_empty() {
        return Err(RunnerError::ConfigError(
            "[ssh].user must not be empty".to_string(),
        ));
    }
    if cfg.ssh.connect_timeout_ms == 0 {
        return Err(RunnerError::ConfigError(
            "[ssh].connect_timeout_ms must be > 0".to_string(),
        ));
    }
    if cfg.ssh.password.is_some() && cfg.ssh.identity_file.is_some() {
        return Err(RunnerError::ConfigError(
            "[ssh] set either password or identity_file, not both".to_string(),
        ));
    }
    Ok(())
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    let runner = &cfg.runner;

    if runner.capture_buffer_bytes < READ_BLOCK_SIZE {
        return Err(RunnerError::ConfigError(format!(
            "[runner].capture_buffer_bytes must be >= {} (got {})",
            READ_BLOCK_SIZE, runner.capture_buffer_bytes
        )));
    }
    if runner.exit_poll_interval_ms == 0 {
        return Err(RunnerError::ConfigError(
            "[runner].exit_poll_interval_ms must be > 0".to_string(),
        ));
    }
    if runner.exit_poll_interval_ms > runner.exit_wait_timeout_ms {
        return Err(RunnerError::ConfigError(format!(
            "[runner].exit_poll_interval_ms ({}) must not exceed exit_wait_timeout_ms ({})",
            runner.exit_poll_interval_ms, runner.exit_wait_timeout_ms
        )));
    }
    Ok(())
}
