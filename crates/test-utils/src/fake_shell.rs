use std::fmt;
use std::io::{self, Cursor};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncWriteExt, DuplexStream};

use remoterun::errors::SessionError;
use remoterun::record::Agent;
use remoterun::remote::{
    BoxFuture, CommandStreams, Credentials, OutputStream, RemoteSession, RemoteShell,
    SessionResult,
};

/// How `open` responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehaviour {
    Connect,
    RejectAuth,
    Unreachable,
}

/// What the submitted command does.
#[derive(Debug, Clone, Default)]
pub struct FakeCommand {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` means the exit status never becomes available.
    pub exit_code: Option<i32>,
    /// Keep both streams open after their bytes until the session closes.
    pub hold_open: bool,
    /// Make `submit` fail with an IO error carrying this message.
    pub submit_error: Option<String>,
}

/// Runs inside `open`, after the session is established.
#[derive(Clone)]
pub struct OpenHook(Arc<dyn Fn() + Send + Sync>);

impl fmt::Debug for OpenHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpenHook")
    }
}

/// Stdout reader handed to the next submit of a [`FakeShell::piped`] shell.
type PipedStdout = Arc<Mutex<Option<DuplexStream>>>;

#[derive(Debug, Default)]
struct ShellLog {
    opened: Vec<String>,
    submitted: Vec<String>,
    closed: usize,
}

/// A scripted `RemoteShell`:
/// - answers `open` according to its [`OpenBehaviour`]
/// - plays back a fixed [`FakeCommand`] for every submit
/// - records hosts opened, commands submitted and sessions closed.
///
/// Clones share the log, so a test can keep one while the runner owns
/// another.
#[derive(Debug, Clone)]
pub struct FakeShell {
    open: OpenBehaviour,
    command: FakeCommand,
    on_open: Option<OpenHook>,
    piped_stdout: Option<PipedStdout>,
    log: Arc<Mutex<ShellLog>>,
}

impl FakeShell {
    /// Connects, prints nothing and exits with `code`.
    pub fn exiting(code: i32) -> Self {
        Self {
            open: OpenBehaviour::Connect,
            command: FakeCommand {
                exit_code: Some(code),
                ..FakeCommand::default()
            },
            on_open: None,
            piped_stdout: None,
            log: Arc::default(),
        }
    }

    /// Connects, but the command never finishes on its own.
    pub fn hanging() -> Self {
        Self {
            open: OpenBehaviour::Connect,
            command: FakeCommand {
                exit_code: None,
                hold_open: true,
                ..FakeCommand::default()
            },
            on_open: None,
            piped_stdout: None,
            log: Arc::default(),
        }
    }

    /// Like [`hanging`](Self::hanging), but stdout is fed by the test
    /// through the returned writer for as long as it likes.
    pub fn piped() -> (Self, DuplexStream) {
        let (reader, writer) = tokio::io::duplex(64 * 1024);
        let shell = Self {
            piped_stdout: Some(Arc::new(Mutex::new(Some(reader)))),
            ..Self::hanging()
        };
        (shell, writer)
    }

    pub fn auth_failure() -> Self {
        Self {
            open: OpenBehaviour::RejectAuth,
            ..Self::exiting(0)
        }
    }

    pub fn connection_failure() -> Self {
        Self {
            open: OpenBehaviour::Unreachable,
            ..Self::exiting(0)
        }
    }

    pub fn with_stdout(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.command.stdout = bytes.as_ref().to_vec();
        self
    }

    pub fn with_stderr(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.command.stderr = bytes.as_ref().to_vec();
        self
    }

    /// Call `hook` once a session is open, before anything is submitted.
    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(OpenHook(Arc::new(hook)));
        self
    }

    /// Connects, but submitting fails with an IO error.
    pub fn failing_submit(mut self, message: impl Into<String>) -> Self {
        self.command.submit_error = Some(message.into());
        self
    }

    /// Streams end normally but no exit status is ever reported.
    pub fn without_exit_status(mut self) -> Self {
        self.command.exit_code = None;
        self
    }

    /// Hosts of every successfully opened session, in order.
    pub fn opened_hosts(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    pub fn submitted(&self) -> Vec<String> {
        self.lock().submitted.clone()
    }

    pub fn closed_sessions(&self) -> usize {
        self.lock().closed
    }

    /// Sessions opened but not yet closed.
    pub fn open_sessions(&self) -> usize {
        let log = self.lock();
        log.opened.len() - log.closed
    }

    fn lock(&self) -> MutexGuard<'_, ShellLog> {
        self.log.lock().unwrap()
    }
}

impl RemoteShell for FakeShell {
    fn open<'a>(
        &'a self,
        agent: &'a Agent,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, SessionResult<Box<dyn RemoteSession>>> {
        Box::pin(async move {
            match self.open {
                OpenBehaviour::RejectAuth => Err(SessionError::Auth {
                    user: credentials.user.clone(),
                    host: agent.host.clone(),
                    reason: "Permission denied (publickey,password)".to_string(),
                }),
                OpenBehaviour::Unreachable => Err(SessionError::Connection {
                    host: agent.host.clone(),
                    reason: "Connection refused".to_string(),
                }),
                OpenBehaviour::Connect => {
                    self.lock().opened.push(agent.host.clone());
                    if let Some(OpenHook(hook)) = &self.on_open {
                        hook();
                    }
                    let piped_stdout = self
                        .piped_stdout
                        .as_ref()
                        .and_then(|slot| slot.lock().unwrap().take());
                    Ok(Box::new(FakeSession {
                        command: self.command.clone(),
                        piped_stdout,
                        log: Arc::clone(&self.log),
                        writers: Vec::new(),
                        closed: false,
                    }) as Box<dyn RemoteSession>)
                }
            }
        })
    }
}

struct FakeSession {
    command: FakeCommand,
    piped_stdout: Option<DuplexStream>,
    log: Arc<Mutex<ShellLog>>,
    writers: Vec<DuplexStream>,
    closed: bool,
}

impl FakeSession {
    async fn held_stream(&mut self, bytes: &[u8]) -> SessionResult<OutputStream> {
        let (reader, mut writer) = tokio::io::duplex(bytes.len() + 1024);
        writer.write_all(bytes).await?;
        self.writers.push(writer);
        Ok(Box::new(reader))
    }
}

impl RemoteSession for FakeSession {
    fn submit<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, SessionResult<CommandStreams>> {
        Box::pin(async move {
            self.log.lock().unwrap().submitted.push(command.to_string());
            if let Some(message) = &self.command.submit_error {
                return Err(SessionError::Io(io::Error::other(message.clone())));
            }
            if self.command.hold_open {
                let stdout_bytes = self.command.stdout.clone();
                let stderr_bytes = self.command.stderr.clone();
                let stdout = match self.piped_stdout.take() {
                    Some(reader) => Box::new(reader) as OutputStream,
                    None => self.held_stream(&stdout_bytes).await?,
                };
                let stderr = self.held_stream(&stderr_bytes).await?;
                Ok(CommandStreams { stdout, stderr })
            } else {
                Ok(CommandStreams {
                    stdout: Box::new(Cursor::new(self.command.stdout.clone())),
                    stderr: Box::new(Cursor::new(self.command.stderr.clone())),
                })
            }
        })
    }

    fn try_exit_status(&mut self) -> SessionResult<Option<i32>> {
        Ok(self.command.exit_code)
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                self.writers.clear();
                self.log.lock().unwrap().closed += 1;
            }
        })
    }
}
