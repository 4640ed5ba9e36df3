// src/remote/ssh.rs

//! [`RemoteShell`] implementation on top of the system `ssh` client.
//!
//! Password logins go through `sshpass -e` (the password is passed in the
//! `SSHPASS` environment variable, never on the command line). Key-based
//! logins run `ssh` in batch mode so a missing key fails fast instead of
//! prompting.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{
    BoxFuture, CommandStreams, Credentials, RemoteSession, RemoteShell, SessionResult,
};
use crate::errors::SessionError;
use crate::record::Agent;

/// Exit code `sshpass` uses for a rejected password.
const SSHPASS_BAD_PASSWORD: i32 = 5;

/// Extra time granted on top of `ConnectTimeout` for the login check to finish.
const LOGIN_CHECK_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct SshShell;

impl SshShell {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteShell for SshShell {
    fn open<'a>(
        &'a self,
        agent: &'a Agent,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, SessionResult<Box<dyn RemoteSession>>> {
        Box::pin(async move {
            let target = SshTarget::new(agent, credentials);
            target.check_login().await?;
            info!(host = %target.host, user = %target.user, "ssh session established");
            Ok(Box::new(SshSession {
                target,
                child: None,
            }) as Box<dyn RemoteSession>)
        })
    }
}

/// Everything needed to build an `ssh` invocation for one agent.
#[derive(Debug, Clone)]
struct SshTarget {
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    identity_file: Option<std::path::PathBuf>,
    connect_timeout: Duration,
}

impl SshTarget {
    fn new(agent: &Agent, credentials: &Credentials) -> Self {
        Self {
            host: agent.host.clone(),
            port: agent.port.or(credentials.default_port),
            user: credentials.user.clone(),
            password: credentials.password.clone(),
            identity_file: credentials.identity_file.clone(),
            connect_timeout: credentials.connect_timeout,
        }
    }

    fn uses_sshpass(&self) -> bool {
        self.password.is_some()
    }

    /// `ssh ... <host> <remote_command>`, not yet spawned.
    fn command(&self, remote_command: &str) -> Command {
        let mut cmd = match &self.password {
            Some(password) => {
                let mut c = Command::new("sshpass");
                c.arg("-e").arg("ssh").env("SSHPASS", password);
                c
            }
            None => {
                let mut c = Command::new("ssh");
                c.arg("-o").arg("BatchMode=yes");
                c
            }
        };

        let timeout_secs = self.connect_timeout.as_secs().max(1);
        cmd.arg("-T")
            .arg("-o")
            .arg(format!("ConnectTimeout={timeout_secs}"))
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-l")
            .arg(&self.user);
        if let Some(port) = self.port {
            cmd.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(&self.host).arg(remote_command);

        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Run a no-op on the agent to verify reachability and credentials.
    async fn check_login(&self) -> SessionResult<()> {
        let mut cmd = self.command("exit 0");
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let output = match tokio::time::timeout(self.connect_timeout + LOGIN_CHECK_GRACE, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SessionError::Connection {
                    host: self.host.clone(),
                    reason: format!("could not launch ssh client: {e}"),
                });
            }
            Err(_) => {
                return Err(SessionError::Connection {
                    host: self.host.clone(),
                    reason: format!("timed out after {:?}", self.connect_timeout),
                });
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_login_failure(
            output.status.code(),
            &stderr,
            self.uses_sshpass(),
            &self.host,
            &self.user,
        ))
    }
}

/// Map a failed login check to an authentication or connection error.
fn classify_login_failure(
    code: Option<i32>,
    stderr: &str,
    uses_sshpass: bool,
    host: &str,
    user: &str,
) -> SessionError {
    let reason = stderr.trim().to_string();
    let auth_rejected = (uses_sshpass && code == Some(SSHPASS_BAD_PASSWORD))
        || stderr.contains("Permission denied");

    if auth_rejected {
        SessionError::Auth {
            user: user.to_string(),
            host: host.to_string(),
            reason: if reason.is_empty() {
                "incorrect username or password".to_string()
            } else {
                reason
            },
        }
    } else {
        SessionError::Connection {
            host: host.to_string(),
            reason: if reason.is_empty() {
                format!("ssh exited with {code:?}")
            } else {
                reason
            },
        }
    }
}

struct SshSession {
    target: SshTarget,
    child: Option<Child>,
}

impl RemoteSession for SshSession {
    fn submit<'a>(&'a mut self, command: &'a str) -> BoxFuture<'a, SessionResult<CommandStreams>> {
        Box::pin(async move {
            if self.child.is_some() {
                return Err(SessionError::Io(std::io::Error::other(
                    "a command was already submitted on this session",
                )));
            }

            let mut cmd = self.target.command(command);
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

            let mut child = cmd.spawn()?;
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();
            self.child = Some(child);

            match (stdout, stderr) {
                (Some(stdout), Some(stderr)) => Ok(CommandStreams {
                    stdout: Box::new(stdout),
                    stderr: Box::new(stderr),
                }),
                _ => Err(SessionError::Io(std::io::Error::other(
                    "ssh client started without output pipes",
                ))),
            }
        })
    }

    fn try_exit_status(&mut self) -> SessionResult<Option<i32>> {
        let Some(child) = self.child.as_mut() else {
            return Err(SessionError::Io(std::io::Error::other(
                "no command submitted on this session",
            )));
        };
        // Killed by a signal: no code, report it as a generic failure.
        Ok(child.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut child) = self.child.take() else {
                debug!(host = %self.target.host, "closing ssh session without a command");
                return;
            };
            match child.try_wait() {
                Ok(Some(_)) => {
                    debug!(host = %self.target.host, "ssh session closed");
                }
                _ => {
                    debug!(host = %self.target.host, "ssh client still running; terminating connection");
                    if let Err(e) = child.kill().await {
                        warn!(host = %self.target.host, error = %e, "failed to terminate ssh client");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn target(password: Option<&str>) -> SshTarget {
        let agent = Agent {
            id: "a1".into(),
            host: "worker-3".into(),
            port: None,
            last_connection_time: None,
        };
        let mut creds = Credentials::new("deploy");
        creds.password = password.map(str::to_string);
        creds.default_port = Some(2222);
        SshTarget::new(&agent, &creds)
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn key_based_login_uses_batch_mode() {
        let cmd = target(None).command("echo hi");
        assert_eq!(cmd.as_std().get_program(), OsStr::new("ssh"));
        let args = args(&cmd);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(&args[args.len() - 2..], ["worker-3", "echo hi"]);
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-l", "deploy"]));
    }

    #[test]
    fn password_login_goes_through_sshpass_env() {
        let cmd = target(Some("s3cret")).command("true");
        assert_eq!(cmd.as_std().get_program(), OsStr::new("sshpass"));
        let args = args(&cmd);
        assert_eq!(&args[..2], ["-e", "ssh"]);
        assert!(!args.iter().any(|a| a.contains("s3cret")));
        let env: Vec<_> = cmd.as_std().get_envs().collect();
        assert!(env.contains(&(OsStr::new("SSHPASS"), Some(OsStr::new("s3cret")))));
    }

    #[test]
    fn classifies_login_failures() {
        let err = classify_login_failure(Some(5), "", true, "h", "u");
        assert!(matches!(err, SessionError::Auth { .. }));

        let err = classify_login_failure(Some(255), "u@h: Permission denied (publickey).", false, "h", "u");
        assert!(matches!(err, SessionError::Auth { .. }));

        let err = classify_login_failure(Some(255), "ssh: connect to host h port 22: Connection refused", false, "h", "u");
        match err {
            SessionError::Connection { host, reason } => {
                assert_eq!(host, "h");
                assert!(reason.contains("Connection refused"));
            }
            other => panic!("expected Connection, got {other:?}"),
        }

        // Exit code 5 only means "bad password" when sshpass is in front.
        let err = classify_login_failure(Some(5), "", false, "h", "u");
        assert!(matches!(err, SessionError::Connection { .. }));
    }
}
