// src/runner/interrupt.rs

//! Cooperative interruption of a running execution.
//!
//! A watchdog (or an operator) holds a clone of the [`InterruptHandle`] that
//! was passed to [`CommandRunner::execute`](super::CommandRunner::execute).
//! Calling [`InterruptHandle::interrupt`] does not touch the remote process;
//! it only stops the runner's local waiting and makes it defer to whatever
//! status the interrupting actor persisted.
//!
//! The handle tracks one phase transition out of `Running`, decided by a
//! compare-and-swap so exactly one side wins:
//! - `interrupt()` moves `Running → Interrupted` and cancels the token;
//! - the runner moves `Running → CommandFinished` once output capture ends,
//!   after which interrupts are ignored.
//!
//! The handle also carries a write lock. Phase changes, the runner's snapshot
//! saves and [`fail_and_interrupt`]'s status write all happen under it, so a
//! snapshot never lands between an interrupting actor's verdict and its
//! interrupt, and the runner cannot finish while that verdict is being
//! written.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::Repository;
use crate::types::ExecStatus;

const RUNNING: u8 = 0;
const COMMAND_FINISHED: u8 = 1;
const INTERRUPTED: u8 = 2;

#[derive(Debug, Default)]
struct Inner {
    phase: AtomicU8,
    token: CancellationToken,
    writes: Mutex<()>,
}

/// Shared interruption flag plus wake-up token for one execution.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    inner: Arc<Inner>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the execution if its command phase is still in progress.
    ///
    /// Callers that own the record's final status must have persisted it
    /// before calling this. Returns `true` only for the call that actually
    /// interrupted; later calls, or calls after the command finished, are
    /// no-ops.
    pub fn interrupt(&self) -> bool {
        let _writes = self.lock_writes();
        self.interrupt_locked()
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == INTERRUPTED
    }

    pub fn is_command_finished(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == COMMAND_FINISHED
    }

    /// Close the window for interruption.
    ///
    /// Returns `false` if an interrupt got there first. Waits for an
    /// in-flight [`fail_and_interrupt`] to complete.
    pub(crate) fn finish_command(&self) -> bool {
        let _writes = self.lock_writes();
        self.inner
            .phase
            .compare_exchange(RUNNING, COMMAND_FINISHED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Hold while writing the record during the command phase.
    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.inner
            .writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolves once [`interrupt`](Self::interrupt) has succeeded.
    pub async fn interrupted(&self) {
        self.inner.token.cancelled().await
    }

    fn is_running(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == RUNNING
    }

    fn interrupt_locked(&self) -> bool {
        let won = self
            .inner
            .phase
            .compare_exchange(RUNNING, INTERRUPTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            debug!("execution interrupted");
            self.inner.token.cancel();
        }
        won
    }
}

/// Act as an interrupting actor: persist `FAILED` with `reason` for a
/// running record, then interrupt its execution.
///
/// The interrupt is claimed before anything is written: if the command
/// phase already finished, the record is left alone. The status is written
/// before the interrupt fires so the runner finds it when it re-reads the
/// record. Returns whether the execution was interrupted.
pub fn fail_and_interrupt(
    repository: &dyn Repository,
    record_id: &str,
    reason: &str,
    handle: &InterruptHandle,
) -> bool {
    let _writes = handle.lock_writes();
    if !handle.is_running() {
        info!(record_id, "execution past its interruptible phase; ignoring");
        return false;
    }

    match repository.load_record(record_id) {
        Ok(mut record) if record.status == ExecStatus::Running => {
            record.status = ExecStatus::Failed;
            record.finish_time = Some(Utc::now());
            record.last_error = Some(reason.to_string());
            if let Err(e) = repository.save_record(&record) {
                warn!(record_id, error = %e, "failed to persist interrupted status");
            }
        }
        Ok(record) => {
            debug!(record_id, status = %record.status, "record not running; interrupting without a status write");
        }
        Err(e) => {
            warn!(record_id, error = %e, "cannot load record to interrupt");
        }
    }

    handle.interrupt_locked()
}
