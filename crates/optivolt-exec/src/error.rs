//! Error types for optivolt-exec

use std::fmt;
use std::time::Duration;

use optivolt_core::ConfigError;
use thiserror::Error;

/// Exit code reported when a command never produced a real exit status
pub const INTERNAL_EXIT_CODE: i32 = -1;

/// Errors that prevent a command from running to completion
///
/// A command that runs and exits non-zero is not an error; it is reported
/// as an unsuccessful `ExecutionResult`.
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Empty or malformed caller input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be resolved or failed validation
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Transport connect or authentication failure
    #[error("SSH connection to {host}:{port} failed: {reason}")]
    SshConnection {
        /// Address that was dialed
        host: String,
        /// Port that was dialed
        port: u16,
        /// What went wrong
        reason: ConnectFailure,
    },

    /// Spawn failure, timeout, or transport failure after connecting
    #[error("command execution failed (exit code {exit_code}): {reason}: {command}")]
    CommandExecution {
        /// Command as issued by the caller
        command: String,
        /// Real exit code, or [`INTERNAL_EXIT_CODE`]
        exit_code: i32,
        /// What went wrong
        reason: String,
    },
}

impl ExecError {
    /// Build a `CommandExecution` error with the internal exit code
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        ExecError::CommandExecution {
            command: command.into(),
            exit_code: INTERNAL_EXIT_CODE,
            reason: reason.into(),
        }
    }

    /// Build a timeout error for `command`
    pub fn timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::command(command, format!("timed out after {timeout:?}"))
    }

    /// Stage of the call that failed
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            ExecError::InvalidArgument(_) => Stage::Argument,
            ExecError::Configuration(e) if e.is_validation() => Stage::Validation,
            ExecError::Configuration(_) => Stage::Resolution,
            ExecError::SshConnection { .. } => Stage::Connection,
            ExecError::CommandExecution { .. } => Stage::Execution,
        }
    }
}

/// Why an SSH session could not be established
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Private key file does not exist
    #[error("private key not found: {0}")]
    KeyMissing(String),

    /// Credentials could not be prepared (unreadable key, no agent, unknown user)
    #[error("credential error: {0}")]
    Credentials(String),

    /// TCP connect or SSH handshake failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Connect did not finish in time
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Server rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),
}

/// Stage of a dispatch, reported with every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Argument,
    Resolution,
    Validation,
    Connection,
    Execution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Argument => "argument",
            Stage::Resolution => "resolution",
            Stage::Validation => "validation",
            Stage::Connection => "connection",
            Stage::Execution => "execution",
        };
        f.write_str(name)
    }
}
