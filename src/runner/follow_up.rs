// src/runner/follow_up.rs

use tracing::{info, warn};

use crate::record::{ExecutionRecord, Scheduling};

/// Downstream work triggered once a record reaches a terminal state.
///
/// Both calls are fire-and-forget: the runner does not wait for, or react
/// to, anything the implementation does.
pub trait FollowUp: Send + Sync {
    /// Hand off the next run of a recurring schedule after `record` succeeded.
    fn schedule_next(&self, record: &ExecutionRecord, scheduling: &Scheduling);

    /// Alert that `record` failed.
    fn notify_failure(&self, record: &ExecutionRecord, scheduling: Option<&Scheduling>);
}

/// Follow-up sink that only logs; used by the standalone binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFollowUp;

impl FollowUp for TracingFollowUp {
    fn schedule_next(&self, record: &ExecutionRecord, scheduling: &Scheduling) {
        info!(
            record_id = %record.id,
            scheduling_id = %scheduling.id,
            scheduling = %scheduling.name,
            "next scheduled run requested"
        );
    }

    fn notify_failure(&self, record: &ExecutionRecord, scheduling: Option<&Scheduling>) {
        warn!(
            record_id = %record.id,
            scheduling_id = scheduling.map(|s| s.id.as_str()).unwrap_or("-"),
            error = record.last_error.as_deref().unwrap_or(""),
            "execution failed"
        );
    }
}
