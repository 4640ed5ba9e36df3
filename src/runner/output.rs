// src/runner/output.rs

//! Concurrent capture of a command's stdout and stderr into its record.
//!
//! The two captures never touch the record. They publish [`CaptureEvent`]s
//! on a channel, and a single merge loop, the only holder of
//! `&mut ExecutionRecord` during this phase, writes each event into the
//! field its stream owns and persists the record.
//!
//! Snapshot saves merge into the stored record rather than overwrite it:
//! only the output fields are copied across, and nothing is written once
//! the stored status is terminal. An interrupting actor's verdict therefore
//! survives any snapshot that races it.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capture::job_id::record_external_job;
use crate::capture::{CaptureSummary, StreamCapture};
use crate::record::ExecutionRecord;
use crate::remote::{CommandStreams, OutputStream};
use crate::runner::InterruptHandle;
use crate::store::Repository;
use crate::types::StreamKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Everything captured so far on `stream`.
    Snapshot { stream: StreamKind, text: String },
    /// Full captured text of `stream`, sent once at its end.
    Finished { stream: StreamKind, text: String },
}

impl CaptureEvent {
    /// Write this event into the record field owned by its stream.
    ///
    /// A finished stream of either kind is also scanned for an external job
    /// id when the record runs against a tracked cluster. The first id found
    /// is kept.
    pub fn apply(self, record: &mut ExecutionRecord, tracking_base_url: Option<&str>) {
        match self {
            CaptureEvent::Snapshot { stream, text } => set_snapshot(record, stream, text),
            CaptureEvent::Finished { stream, text } => {
                if let Some(base) = tracking_base_url {
                    record_external_job(record, base, &text);
                }
                set_snapshot(record, stream, text);
            }
        }
    }
}

fn set_snapshot(record: &mut ExecutionRecord, stream: StreamKind, text: String) {
    match stream {
        StreamKind::Stdout => record.stdout_snapshot = Some(text),
        StreamKind::Stderr => record.stderr_snapshot = Some(text),
    }
}

/// Merge the output fields of `record` into its stored copy.
///
/// Runs under the handle's write lock, so it cannot interleave with an
/// interrupting actor's status write.
fn persist_snapshot(record: &ExecutionRecord, repository: &dyn Repository, interrupt: &InterruptHandle) {
    let _writes = interrupt.lock_writes();
    if interrupt.is_interrupted() {
        return;
    }
    let mut stored = match repository.load_record(&record.id) {
        Ok(stored) => stored,
        Err(e) => {
            warn!(record_id = %record.id, error = %e, "cannot reload record for output snapshot");
            return;
        }
    };
    if stored.status.is_terminal() {
        debug!(record_id = %record.id, status = %stored.status, "stored record is terminal; skipping snapshot");
        return;
    }
    stored.take_output_from(record);
    if let Err(e) = repository.save_output(&stored) {
        warn!(record_id = %record.id, error = %e, "failed to persist output snapshot");
    }
}

/// Run one capture, forwarding its callbacks as events on `tx`.
async fn capture_into(
    capture: StreamCapture,
    reader: OutputStream,
    tx: mpsc::UnboundedSender<CaptureEvent>,
) -> CaptureSummary {
    let stream = capture.kind();
    let final_tx = tx.clone();
    capture
        .run(
            reader,
            |text| {
                let _ = tx.send(CaptureEvent::Snapshot { stream, text });
            },
            move |text| {
                let _ = final_tx.send(CaptureEvent::Finished { stream, text });
            },
        )
        .await
}

/// Capture both streams into `record` until they end or `interrupt` fires.
///
/// Snapshots are persisted as they arrive, except once the execution has
/// been interrupted or the stored record has reached a terminal status:
/// from then on the stored status belongs to the interrupting actor and
/// only the final save may write the record.
pub async fn capture_output(
    record: &mut ExecutionRecord,
    streams: CommandStreams,
    capacity: usize,
    tracking_base_url: Option<&str>,
    repository: &dyn Repository,
    interrupt: &InterruptHandle,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<CaptureEvent>();
    let record_id = record.id.clone();

    {
        let stdout = capture_into(StreamCapture::new(StreamKind::Stdout, capacity), streams.stdout, tx.clone());
        let stderr = capture_into(StreamCapture::new(StreamKind::Stderr, capacity), streams.stderr, tx);

        let merge = async {
            while let Some(event) = rx.recv().await {
                event.apply(record, tracking_base_url);
                persist_snapshot(record, repository, interrupt);
            }
        };

        tokio::select! {
            (out, err, ()) = async { tokio::join!(stdout, stderr, merge) } => {
                debug!(
                    record_id = %record_id,
                    stdout_bytes = out.bytes_read,
                    stderr_bytes = err.bytes_read,
                    "output capture complete"
                );
            }
            _ = interrupt.interrupted() => {
                info!(record_id = %record_id, "interrupted while capturing output");
            }
        }
    }

    // Keep whatever was already published before the interrupt.
    while let Ok(event) = rx.try_recv() {
        event.apply(record, tracking_base_url);
    }
}
