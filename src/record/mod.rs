// src/record/mod.rs

//! Persisted entities the runner reads and writes.
//!
//! - [`ExecutionRecord`] is the unit of scheduling: one run of one command.
//! - [`Agent`], [`Script`], [`Cluster`] and [`Scheduling`] are catalog
//!   entries the record refers to by id.
//!
//! Status transitions live in [`state`].

pub mod state;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExecStatus, ScriptType};

/// Timeout applied to records that were created without one.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 5;

/// Placeholder final status for tracked batch jobs; a separate poller
/// replaces it once the cluster reports the real outcome.
pub const UNDEFINED_JOB_STATUS: &str = "UNDEFINED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,

    #[serde(default)]
    pub status: ExecStatus,

    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,

    /// Minutes after `create_time` at which the record is considered overdue.
    #[serde(default)]
    pub timeout_minutes: Option<u32>,

    /// Command template submitted to the agent.
    pub command: String,

    /// Placeholder → value pairs substituted into `command`.
    #[serde(default)]
    pub arguments: Option<BTreeMap<String, serde_json::Value>>,

    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub script_id: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    /// Absent for one-off chained sub-tasks.
    #[serde(default)]
    pub scheduling_id: Option<String>,

    #[serde(default)]
    pub stdout_snapshot: Option<String>,
    #[serde(default)]
    pub stderr_snapshot: Option<String>,

    #[serde(default)]
    pub external_job_id: Option<String>,
    #[serde(default)]
    pub external_job_url: Option<String>,
    #[serde(default)]
    pub external_job_final_status: Option<String>,

    #[serde(default)]
    pub last_error: Option<String>,
}

impl ExecutionRecord {
    /// A fresh `Pending` record with only the required fields set.
    pub fn new(
        id: impl Into<String>,
        command: impl Into<String>,
        create_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            status: ExecStatus::Pending,
            create_time,
            start_time: None,
            finish_time: None,
            timeout_minutes: None,
            command: command.into(),
            arguments: None,
            agent_id: None,
            script_id: None,
            cluster_id: None,
            scheduling_id: None,
            stdout_snapshot: None,
            stderr_snapshot: None,
            external_job_id: None,
            external_job_url: None,
            external_job_final_status: None,
            last_error: None,
        }
    }

    /// Fill in the default timeout if the record was created without one.
    pub fn apply_default_timeout(&mut self) {
        if self.timeout_minutes.is_none() {
            self.timeout_minutes = Some(DEFAULT_TIMEOUT_MINUTES);
        }
    }

    pub fn effective_timeout_minutes(&self) -> u32 {
        self.timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES)
    }

    /// Instant after which the record belongs to the watchdog.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.create_time + Duration::minutes(i64::from(self.effective_timeout_minutes()))
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline()
    }
}

/// A host that accepts remote shell sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub last_connection_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub script_type: ScriptType,
    /// Logical application name passed to the cluster submitter.
    #[serde(default)]
    pub app_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    /// Base URL of the resource manager's web proxy.
    pub tracking_base_url: String,
}

/// A recurring logical job; records with a scheduling are one run of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduling {
    pub id: String,
    #[serde(default)]
    pub name: String,
}
