//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit status was 0
    pub success: bool,
    /// stdout, followed by stderr when the command failed or wrote to stderr
    pub output: String,
    /// Exit status code
    pub exit_code: i32,
    /// Time taken to execute
    pub duration: Duration,
}

impl ExecutionResult {
    /// Build a result from raw streams
    #[must_use]
    pub fn from_streams(exit_code: i32, stdout: &str, stderr: &str, duration: Duration) -> Self {
        let success = exit_code == 0;
        Self {
            success,
            output: combine_output(success, stdout, stderr),
            exit_code,
            duration,
        }
    }
}

/// Append stderr to stdout, newline-separated, when the command failed or
/// stderr is non-empty
#[must_use]
pub fn combine_output(success: bool, stdout: &str, stderr: &str) -> String {
    if success && stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    }
}
