// src/runner/mod.rs

//! Execution of a single record on a remote agent.
//!
//! [`CommandRunner::execute`] is the whole contract:
//!
//! 1. load the record and skip it if it is overdue or not pending;
//! 2. mark it `RUNNING`;
//! 3. resolve agent, script, cluster and scheduling;
//! 4. open a session, submit the command and capture its output;
//! 5. wait for the exit code and decide `SUCCEEDED` / `FAILED`, unless an
//!    interrupt arrived first, in which case the stored status wins;
//! 6. close the session, persist once, then run follow-ups.
//!
//! Nothing escapes `execute` as an error: every failure ends up in the
//! persisted record and, when not interrupted, in a failure notification.

pub mod command;
pub mod follow_up;
pub mod interrupt;
pub mod output;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::capture::DEFAULT_CAPTURE_CAPACITY;
use crate::errors::{Result, RunnerError, StoreError};
use crate::record::{ExecutionRecord, Script, Scheduling, UNDEFINED_JOB_STATUS};
use crate::remote::{Credentials, RemoteSession, RemoteShell, wait_exit_status};
use crate::store::Repository;
use crate::types::{ExecStatus, ScriptType};

pub use command::build_command;
pub use follow_up::{FollowUp, TracingFollowUp};
pub use interrupt::{InterruptHandle, fail_and_interrupt};

/// Tunables for one runner.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub credentials: Credentials,
    /// Per-stream snapshot cap in bytes.
    pub capture_capacity: usize,
    pub exit_poll_interval: Duration,
    pub exit_wait_timeout: Duration,
}

impl RunnerSettings {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            capture_capacity: DEFAULT_CAPTURE_CAPACITY,
            exit_poll_interval: Duration::from_millis(1000),
            exit_wait_timeout: Duration::from_secs(30),
        }
    }
}

/// How an `execute` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The record could not be loaded; nothing was written.
    Unloadable,
    /// Already past its deadline at dispatch; left for the watchdog.
    StaleDispatch,
    /// Not in `PENDING`; left untouched.
    NotDispatchable(ExecStatus),
    /// Ran to completion; the runner decided the status.
    Finished(ExecStatus),
    /// Interrupted; the status was adopted from storage.
    Interrupted(ExecStatus),
}

/// Catalog entries resolved for one execution.
#[derive(Debug, Default)]
struct Links {
    script: Option<Script>,
    tracking_base_url: Option<String>,
    scheduling: Option<Scheduling>,
}

/// How the remote part of an execution ended.
enum Completion {
    Exited(i32),
    Interrupted,
}

/// Work to trigger after the final record has been saved.
enum FollowUpAction {
    Nothing,
    ScheduleNext,
    NotifyFailure,
}

pub struct CommandRunner<S: RemoteShell> {
    repository: Arc<dyn Repository>,
    shell: S,
    follow_up: Arc<dyn FollowUp>,
    settings: RunnerSettings,
}

impl<S: RemoteShell> CommandRunner<S> {
    pub fn new(
        repository: Arc<dyn Repository>,
        shell: S,
        follow_up: Arc<dyn FollowUp>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            repository,
            shell,
            follow_up,
            settings,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run record `record_id` to a terminal state.
    ///
    /// `interrupt` may be triggered from any task while this runs.
    pub async fn execute(&self, record_id: &str, interrupt: &InterruptHandle) -> RunOutcome {
        let mut record = match self.repository.load_record(record_id) {
            Ok(record) => record,
            Err(e) => {
                error!(record_id, error = %e, "cannot load execution record");
                return RunOutcome::Unloadable;
            }
        };
        record.apply_default_timeout();

        let now = Utc::now();
        if record.is_overdue(now) {
            info!(
                record_id,
                deadline = %record.deadline(),
                "record already overdue at dispatch; leaving it to the watchdog"
            );
            return RunOutcome::StaleDispatch;
        }
        if let Err(e) = record.start(now) {
            warn!(record_id, status = %record.status, error = %e, "record is not pending; skipping");
            return RunOutcome::NotDispatchable(record.status);
        }

        let mut links = Links::default();
        let completion = self.run_started(&mut record, now, interrupt, &mut links).await;

        let (outcome, action) = match completion {
            Ok(Completion::Exited(code)) => {
                let action = self.conclude_exit(&mut record, code, &links);
                (RunOutcome::Finished(record.status), action)
            }
            Ok(Completion::Interrupted) => {
                self.adopt_stored_status(&mut record);
                (RunOutcome::Interrupted(record.status), FollowUpAction::Nothing)
            }
            Err(err) => {
                error!(record_id, error = %err, "command execution failed");
                if interrupt.is_interrupted() {
                    self.adopt_stored_status(&mut record);
                    record.last_error = Some(err.to_string());
                    (RunOutcome::Interrupted(record.status), FollowUpAction::Nothing)
                } else {
                    if let Err(e) = record.fail(Utc::now(), err.to_string()) {
                        warn!(record_id, error = %e, "could not mark record failed");
                    }
                    (RunOutcome::Finished(record.status), FollowUpAction::NotifyFailure)
                }
            }
        };

        if let Err(e) = self.repository.save_record(&record) {
            error!(record_id, error = %e, "failed to persist final record state");
        }

        match action {
            FollowUpAction::Nothing => {}
            FollowUpAction::ScheduleNext => {
                if let Some(scheduling) = &links.scheduling {
                    self.follow_up.schedule_next(&record, scheduling);
                }
            }
            FollowUpAction::NotifyFailure => {
                self.follow_up.notify_failure(&record, links.scheduling.as_ref());
            }
        }

        info!(record_id, ?outcome, "execution finished");
        outcome
    }

    /// Everything between `RUNNING` and the exit code.
    async fn run_started(
        &self,
        record: &mut ExecutionRecord,
        started_at: DateTime<Utc>,
        interrupt: &InterruptHandle,
        links: &mut Links,
    ) -> Result<Completion> {
        self.repository.save_record(record)?;

        let agent_id = record
            .agent_id
            .clone()
            .ok_or_else(|| RunnerError::MissingReference(record.id.clone(), "agent"))?;
        let script_id = record
            .script_id
            .clone()
            .ok_or_else(|| RunnerError::MissingReference(record.id.clone(), "script"))?;

        let mut agent = self.repository.load_agent(&agent_id)?;
        let script = self.repository.load_script(&script_id)?;
        links.scheduling = self.resolve_scheduling(record)?;
        if script.script_type != ScriptType::Shell {
            let cluster_id = record
                .cluster_id
                .clone()
                .ok_or_else(|| RunnerError::MissingReference(record.id.clone(), "cluster"))?;
            links.tracking_base_url = Some(self.repository.load_cluster(&cluster_id)?.tracking_base_url);
        }
        links.script = Some(script);

        let mut session = self
            .shell
            .open(&agent, &self.settings.credentials)
            .await?;

        agent.last_connection_time = Some(Utc::now());
        if let Err(e) = self.repository.save_agent(&agent) {
            warn!(agent_id = %agent.id, error = %e, "failed to record agent connection time");
        }

        let result = self
            .run_in_session(session.as_mut(), record, started_at, interrupt, links)
            .await;
        session.close().await;
        debug!(record_id = %record.id, host = %agent.host, "remote session closed");
        result
    }

    async fn run_in_session(
        &self,
        session: &mut dyn RemoteSession,
        record: &mut ExecutionRecord,
        started_at: DateTime<Utc>,
        interrupt: &InterruptHandle,
        links: &Links,
    ) -> Result<Completion> {
        let Some(script) = links.script.as_ref() else {
            return Err(RunnerError::MissingReference(record.id.clone(), "script"));
        };
        let command = build_command(record, script, links.scheduling.is_some(), started_at);
        info!(record_id = %record.id, command = %command, "submitting command");

        let streams = session.submit(&command).await?;
        if !interrupt.is_interrupted() {
            output::capture_output(
                record,
                streams,
                self.settings.capture_capacity,
                links.tracking_base_url.as_deref(),
                self.repository.as_ref(),
                interrupt,
            )
            .await;
        }

        if !interrupt.finish_command() {
            return Ok(Completion::Interrupted);
        }

        let code = wait_exit_status(
            session,
            self.settings.exit_poll_interval,
            self.settings.exit_wait_timeout,
        )
        .await?;
        info!(record_id = %record.id, exit_code = code, "remote command exited");
        Ok(Completion::Exited(code))
    }

    fn resolve_scheduling(&self, record: &ExecutionRecord) -> Result<Option<Scheduling>> {
        let Some(id) = record.scheduling_id.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        match self.repository.load_scheduling(id) {
            Ok(scheduling) => Ok(Some(scheduling)),
            Err(StoreError::NotFound { .. }) => {
                warn!(record_id = %record.id, scheduling_id = id, "scheduling not found; running as one-off");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map the exit code onto the record and pick the follow-up.
    fn conclude_exit(&self, record: &mut ExecutionRecord, code: i32, links: &Links) -> FollowUpAction {
        let now = Utc::now();
        let script_type = links.script.as_ref().map(|s| s.script_type);

        if code != 0 {
            if let Err(e) = record.fail(now, format!("command exited with status {code}")) {
                warn!(record_id = %record.id, error = %e, "could not mark record failed");
            }
            return FollowUpAction::NotifyFailure;
        }

        if let Err(e) = record.succeed(now) {
            warn!(record_id = %record.id, error = %e, "could not mark record succeeded");
        }

        match script_type {
            Some(ScriptType::Shell) | None => {
                if links.scheduling.is_some() {
                    FollowUpAction::ScheduleNext
                } else {
                    FollowUpAction::Nothing
                }
            }
            Some(script_type) => {
                if script_type.is_tracked_batch() {
                    record.external_job_final_status = Some(UNDEFINED_JOB_STATUS.to_string());
                }
                if record.external_job_id.is_none() {
                    error!(
                        record_id = %record.id,
                        "no external job id found in stdout; make sure the submitter logs at INFO level"
                    );
                }
                FollowUpAction::Nothing
            }
        }
    }

    /// Interrupted path: take the status the interrupting actor stored.
    fn adopt_stored_status(&self, record: &mut ExecutionRecord) {
        match self.repository.load_record(&record.id) {
            Ok(stored) if stored.status.is_terminal() => {
                info!(record_id = %record.id, status = %stored.status, "adopting stored status after interrupt");
                record.adopt_authoritative(&stored);
            }
            Ok(stored) => {
                warn!(record_id = %record.id, status = %stored.status, "interrupted without a terminal stored status; marking failed");
                mark_interrupted(
                    record,
                    format!("interrupted; stored status {} is not terminal", stored.status),
                );
            }
            Err(e) => {
                error!(record_id = %record.id, error = %e, "cannot re-read interrupted record; marking failed");
                mark_interrupted(record, format!("interrupted; stored record unavailable: {e}"));
            }
        }
    }
}

/// Never leave an interrupted record RUNNING.
fn mark_interrupted(record: &mut ExecutionRecord, reason: String) {
    record.status = ExecStatus::Failed;
    record.finish_time = Some(Utc::now());
    record.last_error = Some(reason);
}
