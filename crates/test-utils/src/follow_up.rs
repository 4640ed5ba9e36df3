use std::sync::{Arc, Mutex};

use remoterun::record::{ExecutionRecord, Scheduling};
use remoterun::runner::FollowUp;
use remoterun::types::ExecStatus;

/// One call the runner made on its follow-up sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpCall {
    ScheduleNext {
        record_id: String,
        scheduling_id: String,
    },
    NotifyFailure {
        record_id: String,
        status: ExecStatus,
        scheduling_id: Option<String>,
    },
}

/// A `FollowUp` that only records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingFollowUp {
    calls: Arc<Mutex<Vec<FollowUpCall>>>,
}

impl RecordingFollowUp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<FollowUpCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl FollowUp for RecordingFollowUp {
    fn schedule_next(&self, record: &ExecutionRecord, scheduling: &Scheduling) {
        self.calls.lock().unwrap().push(FollowUpCall::ScheduleNext {
            record_id: record.id.clone(),
            scheduling_id: scheduling.id.clone(),
        });
    }

    fn notify_failure(&self, record: &ExecutionRecord, scheduling: Option<&Scheduling>) {
        self.calls.lock().unwrap().push(FollowUpCall::NotifyFailure {
            record_id: record.id.clone(),
            status: record.status,
            scheduling_id: scheduling.map(|s| s.id.clone()),
        });
    }
}
