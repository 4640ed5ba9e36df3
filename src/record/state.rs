// src/record/state.rs

//! Status transitions for [`ExecutionRecord`].
//!
//! ```text
//! PENDING ──start──▶ RUNNING ──succeed──▶ SUCCEEDED
//!                       │
//!                       └─────fail──────▶ FAILED
//! ```
//!
//! The runner is the only writer of these transitions. When an external
//! watchdog interrupts a run, the runner instead calls
//! [`ExecutionRecord::adopt_authoritative`] with the record re-read from
//! storage, so its own late verdict never replaces the watchdog's. Output
//! snapshots saved mid-run go the other way through
//! [`ExecutionRecord::take_output_from`].

use chrono::{DateTime, Utc};

use crate::errors::{Result, RunnerError};
use crate::record::ExecutionRecord;
use crate::types::ExecStatus;

impl ExecutionRecord {
    /// PENDING → RUNNING.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(ExecStatus::Pending, ExecStatus::Running)?;
        self.start_time = Some(now);
        Ok(())
    }

    /// RUNNING → SUCCEEDED.
    pub fn succeed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(ExecStatus::Running, ExecStatus::Succeeded)?;
        self.finish_time = Some(now);
        Ok(())
    }

    /// RUNNING → FAILED, recording `error` as the diagnostic.
    pub fn fail(&mut self, now: DateTime<Utc>, error: impl Into<String>) -> Result<()> {
        self.transition(ExecStatus::Running, ExecStatus::Failed)?;
        self.finish_time = Some(now);
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Take over the fields an interrupting actor owns.
    ///
    /// Output snapshots and external job fields are produced locally and
    /// stay as captured.
    pub fn adopt_authoritative(&mut self, stored: &ExecutionRecord) {
        self.status = stored.status;
        self.finish_time = stored.finish_time;
        self.last_error = stored.last_error.clone();
    }

    /// Copy the fields the runner produces while capturing from `local`.
    ///
    /// The inverse of [`adopt_authoritative`](Self::adopt_authoritative):
    /// status fields stay as stored.
    pub fn take_output_from(&mut self, local: &ExecutionRecord) {
        self.stdout_snapshot = local.stdout_snapshot.clone();
        self.stderr_snapshot = local.stderr_snapshot.clone();
        self.external_job_id = local.external_job_id.clone();
        self.external_job_url = local.external_job_url.clone();
        self.external_job_final_status = local.external_job_final_status.clone();
    }

    fn transition(&mut self, from: ExecStatus, to: ExecStatus) -> Result<()> {
        if self.status != from {
            return Err(RunnerError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn running() -> ExecutionRecord {
        let mut rec = ExecutionRecord::new("r1", "true", now());
        rec.start(now()).unwrap();
        rec
    }

    #[test]
    fn start_sets_start_time() {
        let rec = running();
        assert_eq!(rec.status, ExecStatus::Running);
        assert_eq!(rec.start_time, Some(now()));
        assert_eq!(rec.finish_time, None);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut rec = running();
        let err = rec.start(now()).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::InvalidTransition {
                from: ExecStatus::Running,
                to: ExecStatus::Running
            }
        ));
    }

    #[test]
    fn terminal_states_are_final() {
        let mut rec = running();
        rec.succeed(now()).unwrap();
        assert!(rec.fail(now(), "late").is_err());
        assert!(rec.succeed(now()).is_err());
        assert_eq!(rec.status, ExecStatus::Succeeded);
        assert_eq!(rec.last_error, None);
    }

    #[test]
    fn fail_records_error() {
        let mut rec = running();
        rec.fail(now(), "command exited with status 2").unwrap();
        assert_eq!(rec.status, ExecStatus::Failed);
        assert_eq!(rec.finish_time, Some(now()));
        assert_eq!(rec.last_error.as_deref(), Some("command exited with status 2"));
    }

    #[test]
    fn adopt_keeps_local_output() {
        let mut rec = running();
        rec.stdout_snapshot = Some("local out".into());
        rec.external_job_id = Some("application_1_2".into());

        let mut stored = rec.clone();
        stored.status = ExecStatus::Failed;
        stored.finish_time = Some(now());
        stored.last_error = Some("timed out".into());
        stored.stdout_snapshot = Some("stale".into());
        stored.external_job_id = None;

        rec.adopt_authoritative(&stored);
        assert_eq!(rec.status, ExecStatus::Failed);
        assert_eq!(rec.last_error.as_deref(), Some("timed out"));
        assert_eq!(rec.stdout_snapshot.as_deref(), Some("local out"));
        assert_eq!(rec.external_job_id.as_deref(), Some("application_1_2"));
    }

    #[test]
    fn take_output_leaves_status_alone() {
        let mut local = running();
        local.stdout_snapshot = Some("progress 50%".into());
        local.stderr_snapshot = Some("warn".into());
        local.external_job_id = Some("application_1_2".into());
        local.external_job_url = Some("http://rm/proxy/application_1_2".into());

        let mut stored = running();
        stored.fail(now(), "timed out").unwrap();
        stored.take_output_from(&local);

        assert_eq!(stored.status, ExecStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("timed out"));
        assert_eq!(stored.stdout_snapshot.as_deref(), Some("progress 50%"));
        assert_eq!(stored.stderr_snapshot.as_deref(), Some("warn"));
        assert_eq!(stored.external_job_id.as_deref(), Some("application_1_2"));
        assert_eq!(
            stored.external_job_url.as_deref(),
            Some("http://rm/proxy/application_1_2")
        );
    }
}
