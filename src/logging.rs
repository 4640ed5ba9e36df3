// src/logging.rs

//! Logging setup for `remoterun` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `REMOTERUN_LOG` environment variable, any `EnvFilter` directive
//!    (e.g. "debug" or "remoterun::runner=trace,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for `--dry-run`
//! output.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const ENV_VAR: &str = "REMOTERUN_LOG";

/// Initialise global logging subscriber.
///
/// Fails if called twice or if `REMOTERUN_LOG` does not parse.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(directive_for(lvl)),
        None => filter_from_env(std::env::var(ENV_VAR).ok().as_deref())?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
        .context("installing tracing subscriber")
}

fn directive_for(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn filter_from_env(value: Option<&str>) -> Result<EnvFilter> {
    match value.map(str::trim) {
        Some(spec) if !spec.is_empty() => EnvFilter::try_new(spec)
            .with_context(|| format!("invalid {ENV_VAR} value {spec:?}")),
        _ => Ok(EnvFilter::new("info")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_accepts_directives() {
        let filter = filter_from_env(Some(" remoterun::runner=trace,warn ")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("remoterun::runner=trace"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn missing_or_blank_env_defaults_to_info() {
        assert_eq!(filter_from_env(None).unwrap().to_string(), "info");
        assert_eq!(filter_from_env(Some("  ")).unwrap().to_string(), "info");
    }

    #[test]
    fn garbage_env_is_rejected() {
        assert!(filter_from_env(Some("remoterun=[[[")).is_err());
    }

    #[test]
    fn cli_levels_map_to_directives() {
        assert_eq!(directive_for(LogLevel::Warn), "warn");
        assert_eq!(directive_for(LogLevel::Trace), "trace");
    }
}
