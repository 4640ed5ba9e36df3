// src/remote/mod.rs

//! Remote shell sessions.
//!
//! The runner talks to a [`RemoteShell`] instead of a concrete transport so
//! tests can substitute a scripted fake while production uses [`SshShell`].
//!
//! Lifecycle of one execution:
//!
//! 1. [`RemoteShell::open`] connects and authenticates, failing with
//!    [`SessionError::Connection`] or [`SessionError::Auth`] before anything
//!    runs on the agent.
//! 2. [`RemoteSession::submit`] starts the command and hands back its output
//!    streams.
//! 3. [`wait_exit_status`] polls the session until the exit code is known.
//! 4. [`RemoteSession::close`] releases the connection. Callers invoke it on
//!    every path; implementations also release on drop.
//!
//! A non-zero exit code is a normal result, not an error.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

use crate::errors::SessionError;
use crate::record::Agent;

pub mod ssh;

pub use ssh::SshShell;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One output stream of a submitted command.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Login settings shared by every session the runner opens.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// Port used when the agent does not specify one.
    pub default_port: Option<u16>,
}

impl Credentials {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: None,
            identity_file: None,
            connect_timeout: Duration::from_secs(10),
            default_port: None,
        }
    }
}

/// Output handles of a command that has been submitted.
pub struct CommandStreams {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
}

/// Opens sessions to agents.
pub trait RemoteShell: Send + Sync {
    fn open<'a>(
        &'a self,
        agent: &'a Agent,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, SessionResult<Box<dyn RemoteSession>>>;
}

/// An authenticated connection that runs a single command.
pub trait RemoteSession: Send {
    fn submit<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, SessionResult<CommandStreams>>;

    /// Exit code of the submitted command, or `None` while it is running.
    fn try_exit_status(&mut self) -> SessionResult<Option<i32>>;

    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Poll `session` every `poll_interval` until the command's exit code is
/// known, giving up after `max_wait`.
pub async fn wait_exit_status(
    session: &mut dyn RemoteSession,
    poll_interval: Duration,
    max_wait: Duration,
) -> SessionResult<i32> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(code) = session.try_exit_status()? {
            trace!(exit_code = code, "remote exit status available");
            return Ok(code);
        }
        let waited = started.elapsed();
        if waited >= max_wait {
            return Err(SessionError::ExitStatusUnavailable {
                waited_ms: waited.as_millis(),
            });
        }
    }
}
