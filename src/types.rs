// src/types.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution record.
///
/// - `Pending`: created by the scheduling harness, not yet picked up.
/// - `Running`: the runner has started remote work.
/// - `Succeeded` / `Failed`: terminal; written once, either by the runner or
///   by an external watchdog that interrupted it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ExecStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecStatus::Succeeded | ExecStatus::Failed)
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecStatus::Pending => "PENDING",
            ExecStatus::Running => "RUNNING",
            ExecStatus::Succeeded => "SUCCEEDED",
            ExecStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Kind of script a record was instantiated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptType {
    Shell,
    SparkBatch,
    FlinkBatch,
    SparkStream,
    FlinkStream,
}

impl ScriptType {
    /// Batch submissions whose final status is tracked by the cluster.
    pub fn is_tracked_batch(self) -> bool {
        matches!(self, ScriptType::SparkBatch | ScriptType::FlinkBatch)
    }

    /// Command-line flag carrying the application name, if the submitter
    /// has one we know how to rewrite.
    pub fn app_name_flag(self) -> Option<&'static str> {
        match self {
            ScriptType::SparkBatch => Some("--name"),
            ScriptType::FlinkBatch => Some("-ynm"),
            _ => None,
        }
    }
}

/// Which output stream of the remote command a capture is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}
