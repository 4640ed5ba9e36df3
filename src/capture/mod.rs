// src/capture/mod.rs

//! Incremental capture of one output stream of a remote command.
//!
//! A [`StreamCapture`] reads its stream in fixed-size blocks and reports
//! through two callbacks:
//! - `on_chunk` after every block while the buffer is under capacity, with
//!   the text accumulated so far (a growing snapshot, not a diff);
//! - `on_final` once at end of stream with the full captured text, if any.
//!
//! Past capacity the stream is still drained so the remote side never blocks
//! on a full pipe, but the extra bytes are dropped. Read errors end the
//! capture early; they never fail the job.
//!
//! [`job_id`] holds the extraction applied to the final stdout text.

pub mod job_id;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::types::StreamKind;

/// Snapshot size cap used when none is configured.
pub const DEFAULT_CAPTURE_CAPACITY: usize = 61440;

/// Size of each read from the underlying stream.
pub const READ_BLOCK_SIZE: usize = 1024;

/// What a finished capture observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Every byte drained from the stream, kept or not.
    pub bytes_read: u64,
    /// Bytes retained in the snapshot.
    pub bytes_kept: usize,
    /// The stream ended on a read error rather than EOF.
    pub failed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamCapture {
    kind: StreamKind,
    capacity: usize,
}

impl StreamCapture {
    pub fn new(kind: StreamKind, capacity: usize) -> Self {
        Self { kind, capacity }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Drain `reader` to the end, publishing snapshots as described in the
    /// module docs. The reader is dropped before `on_final` runs.
    pub async fn run<R, C, F>(self, mut reader: R, mut on_chunk: C, on_final: F) -> CaptureSummary
    where
        R: AsyncRead + Unpin,
        C: FnMut(String),
        F: FnOnce(String),
    {
        let mut summary = CaptureSummary::default();
        let mut kept: Vec<u8> = Vec::new();
        let mut block = [0u8; READ_BLOCK_SIZE];

        loop {
            match reader.read(&mut block).await {
                Ok(0) => break,
                Ok(n) => {
                    summary.bytes_read += n as u64;
                    // The check is on the size before this block, so the
                    // snapshot may overshoot capacity by less than one block.
                    if kept.len() < self.capacity {
                        kept.extend_from_slice(&block[..n]);
                        on_chunk(String::from_utf8_lossy(&kept).into_owned());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(stream = %self.kind, error = %e, "error reading stream; treating as ended");
                    summary.failed = true;
                    break;
                }
            }
        }
        drop(reader);

        summary.bytes_kept = kept.len();
        debug!(
            stream = %self.kind,
            bytes_read = summary.bytes_read,
            bytes_kept = summary.bytes_kept,
            "stream capture finished"
        );

        if !kept.is_empty() {
            on_final(String::from_utf8_lossy(&kept).into_owned());
        }

        summary
    }
}
