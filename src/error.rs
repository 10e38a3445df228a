use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistError {
    #[error("Failed to connect SSH session or execute SSH command: {0}")]
    SshError(#[from] openssh::Error),
    #[error("Failed to execute local command: {0}")]
    LocalCommandError(#[from] std::io::Error),
    #[error("Failed to read or write configuration: {0}")]
    ConfigError(#[from] serde_yaml::Error),
    #[error("Host {0} is unreachable")]
    Unreachable(String),
    #[error("Host {host} returned a malformed load sample {line:?}: {reason}")]
    MalformedSample {
        host: String,
        line: String,
        reason: String,
    },
    #[error("No reachable hosts found")]
    NoReachableHost,
    #[error("Command on {host} failed: {status}")]
    CommandFailed { host: String, status: ExitStatus },
    #[error("{failed} of {total} hosts failed, last failure: {last}")]
    DispatchFailed {
        failed: usize,
        total: usize,
        last: Box<DistError>,
    },
    #[error("Dispatch task for {0} died: {1}")]
    TaskFailed(String, String),
    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(std::time::Duration, String),
    #[error("Group {0:?} not found")]
    GroupNotFound(String),
    #[error("No hosts in group {0:?}")]
    EmptyGroup(String),
    #[error("Path does not exist: {0}")]
    PathNotFound(String),
    #[error("rsync with {host} failed: {status}")]
    SyncFailed { host: String, status: ExitStatus },
    #[error("Failed to render command template: {0}")]
    TemplateError(String),
    #[error("Could not determine the home or config directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, DistError>;
