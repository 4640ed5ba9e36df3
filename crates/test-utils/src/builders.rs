#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use remoterun::remote::Credentials;
use remoterun::runner::RunnerSettings;
use remoterun::record::{Agent, Cluster, ExecutionRecord, Scheduling, Script};
use remoterun::store::MemoryRepository;
use remoterun::types::{ExecStatus, ScriptType};

pub const AGENT_ID: &str = "agent-1";
pub const AGENT_HOST: &str = "worker-01.internal";
pub const SCRIPT_ID: &str = "script-1";
pub const CLUSTER_ID: &str = "cluster-1";
pub const SCHEDULING_ID: &str = "sched-1";
pub const TRACKING_BASE_URL: &str = "http://rm.internal:8088/";

/// Builder for `ExecutionRecord` to simplify test setup.
///
/// Defaults to a `PENDING` record created now, pointing at [`AGENT_ID`] and
/// [`SCRIPT_ID`], with no timeout, cluster or scheduling.
pub struct RecordBuilder {
    record: ExecutionRecord,
}

impl RecordBuilder {
    pub fn new(id: &str, command: &str) -> Self {
        let mut record = ExecutionRecord::new(id, command, Utc::now());
        record.agent_id = Some(AGENT_ID.to_string());
        record.script_id = Some(SCRIPT_ID.to_string());
        Self { record }
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.create_time = at;
        self
    }

    pub fn timeout_minutes(mut self, minutes: u32) -> Self {
        self.record.timeout_minutes = Some(minutes);
        self
    }

    pub fn status(mut self, status: ExecStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn argument(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.record
            .arguments
            .get_or_insert_with(Default::default)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn cluster(mut self, id: &str) -> Self {
        self.record.cluster_id = Some(id.to_string());
        self
    }

    pub fn scheduling(mut self, id: &str) -> Self {
        self.record.scheduling_id = Some(id.to_string());
        self
    }

    pub fn without_agent(mut self) -> Self {
        self.record.agent_id = None;
        self
    }

    pub fn build(self) -> ExecutionRecord {
        self.record
    }
}

/// Repository holding one agent, one script of `script_type`, one cluster
/// and one scheduling under the ids defined in this module.
pub fn seeded_repository(script_type: ScriptType, app_name: &str) -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.insert_agent(Agent {
        id: AGENT_ID.to_string(),
        host: AGENT_HOST.to_string(),
        port: None,
        last_connection_time: None,
    });
    repo.insert_script(Script {
        id: SCRIPT_ID.to_string(),
        script_type,
        app_name: app_name.to_string(),
    });
    repo.insert_cluster(Cluster {
        id: CLUSTER_ID.to_string(),
        tracking_base_url: TRACKING_BASE_URL.to_string(),
    });
    repo.insert_scheduling(Scheduling {
        id: SCHEDULING_ID.to_string(),
        name: "nightly".to_string(),
    });
    repo
}

/// Runner settings with short exit polling so tests finish quickly.
pub fn fast_settings() -> RunnerSettings {
    let mut settings = RunnerSettings::new(Credentials::new("deploy"));
    settings.exit_poll_interval = Duration::from_millis(5);
    settings.exit_wait_timeout = Duration::from_millis(50);
    settings
}
