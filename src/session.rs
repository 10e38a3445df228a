//! Remote-shell transport.
//!
//! Every remote interaction goes through [`Transport`]: probing, load sampling and command
//! dispatch all build on it. [`SshTransport`] is the production implementation on top of an
//! OpenSSH control-master connection; tests swap in a scripted mock.

use std::process::{ExitStatus, Output};
use std::time::Duration;

use async_trait::async_trait;
use openssh::{KnownHosts, Session as SSHSession, SessionBuilder, Stdio};

use crate::error::Result;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `command` through `sh -c` on `host` without a terminal or standard input, and capture
    /// its output. `connect_timeout` bounds connection setup only.
    async fn capture(
        &self,
        host: &str,
        command: &str,
        connect_timeout: Option<Duration>,
    ) -> Result<Output>;

    /// Run `command` through `sh -c` on `host` with the local standard streams attached.
    async fn attach(&self, host: &str, command: &str) -> Result<ExitStatus>;
}

/// Opens a fresh multiplexed SSH connection per call and tears it down afterwards.
#[derive(Debug, Default, Clone)]
pub struct SshTransport;

impl SshTransport {
    pub fn new() -> Self {
        Self
    }

    async fn connect(&self, host: &str, connect_timeout: Option<Duration>) -> Result<SSHSession> {
        let mut builder = SessionBuilder::default();
        builder.known_hosts_check(KnownHosts::Add);
        if let Some(timeout) = connect_timeout {
            builder.connect_timeout(timeout);
        }
        match builder.connect_mux(host).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::debug!(host, error = %e, "Failed to connect to host");
                Err(e.into())
            }
        }
    }

    async fn close(host: &str, session: SSHSession) {
        if let Err(e) = session.close().await {
            tracing::debug!(host, error = %e, "Error while terminating connection");
        }
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn capture(
        &self,
        host: &str,
        command: &str,
        connect_timeout: Option<Duration>,
    ) -> Result<Output> {
        let session = self.connect(host, connect_timeout).await?;
        let result = {
            let mut cmd = session.command("sh");
            cmd.arg("-c")
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            cmd.output().await
        };
        Self::close(host, session).await;
        Ok(result?)
    }

    async fn attach(&self, host: &str, command: &str) -> Result<ExitStatus> {
        let session = self.connect(host, None).await?;
        let result = {
            let mut cmd = session.command("sh");
            cmd.arg("-c")
                .arg(command)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
            cmd.status().await
        };
        Self::close(host, session).await;
        let status = result?;
        tracing::debug!(host, %status, "Remote command finished");
        Ok(status)
    }
}
