//! Execution channel traits

use std::time::Duration;

use async_trait::async_trait;
use optivolt_core::HostConfig;

use crate::error::ExecError;
use crate::result::ExecutionResult;

/// A channel that runs one shell command for an environment
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `cmd`, failing if it does not finish within `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError>;

    /// Channel name for logs (`local`, `ssh`)
    fn executor_type(&self) -> &'static str;
}

/// Creates a fresh channel for each dispatched command
pub trait ChannelFactory: Send + Sync {
    /// Channel running on this machine in `working_directory`
    fn local(&self, working_directory: &str) -> Box<dyn Executor>;

    /// Channel running on the host described by `config`
    ///
    /// # Errors
    /// Returns `ExecError` if the channel cannot be prepared
    fn remote(&self, config: &HostConfig) -> Result<Box<dyn Executor>, ExecError>;
}
