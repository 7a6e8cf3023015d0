//! Default channel factory

use optivolt_core::HostConfig;
use tracing::debug;

use crate::error::ExecError;
use crate::keys::CredentialSource;
use crate::local::LocalExecutor;
use crate::ssh::SshExecutor;
use crate::traits::{ChannelFactory, Executor};

/// Creates `LocalExecutor` and `SshExecutor` channels
///
/// The SSH credential source is selected from the process environment each
/// time a remote channel is built.
#[derive(Debug, Clone, Default)]
pub struct DefaultChannelFactory;

impl DefaultChannelFactory {
    /// Create a new factory instance
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ChannelFactory for DefaultChannelFactory {
    fn local(&self, working_directory: &str) -> Box<dyn Executor> {
        Box::new(LocalExecutor::in_directory(working_directory))
    }

    fn remote(&self, config: &HostConfig) -> Result<Box<dyn Executor>, ExecError> {
        let credentials = CredentialSource::select(&config.credential_ref);
        debug!(
            host = %config.dial_address(),
            credentials = credentials.kind(),
            "creating SSH channel"
        );
        Ok(Box::new(SshExecutor::new(config.clone(), credentials)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_types() {
        let factory = DefaultChannelFactory::new();

        assert_eq!(factory.local("/tmp").executor_type(), "local");

        let config = HostConfig::new("10.0.0.5", "root");
        assert_eq!(factory.remote(&config).unwrap().executor_type(), "ssh");
    }
}
