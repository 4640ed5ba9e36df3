// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `remoterun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "remoterun",
    version,
    about = "Run a scheduled execution record on its remote agent.",
    long_about = None
)]
pub struct CliArgs {
    /// Id of the execution record to run.
    #[arg(value_name = "RECORD_ID")]
    pub record_id: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `Remoterun.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REMOTERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load the record and print the command it would submit, without
    /// connecting to the agent or changing the record.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_and_flags() {
        let args = CliArgs::try_parse_from([
            "remoterun",
            "--config",
            "conf/run.toml",
            "--log-level",
            "debug",
            "--dry-run",
            "rec-42",
        ])
        .unwrap();
        assert_eq!(args.record_id, "rec-42");
        assert_eq!(args.config, Some(PathBuf::from("conf/run.toml")));
        assert!(args.dry_run);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn config_is_optional() {
        let args = CliArgs::try_parse_from(["remoterun", "rec-1"]).unwrap();
        assert_eq!(args.config, None);
        assert!(!args.dry_run);
    }

    #[test]
    fn record_id_is_required() {
        assert!(CliArgs::try_parse_from(["remoterun"]).is_err());
    }
}
