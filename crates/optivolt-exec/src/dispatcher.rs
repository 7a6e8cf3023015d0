//! Command dispatch: resolve, validate, classify, run

use std::sync::Arc;
use std::time::Duration;

use optivolt_core::{ConfigError, EnvironmentResolver, HostConfig};
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::factory::DefaultChannelFactory;
use crate::result::ExecutionResult;
use crate::traits::{ChannelFactory, Executor};

/// Timeout applied by [`Dispatcher::execute_default`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs commands against named environments
///
/// Holds no mutable state: concurrent calls each resolve the configuration
/// and get their own channel.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: EnvironmentResolver,
    factory: Arc<dyn ChannelFactory>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher using the default local and SSH channels
    #[must_use]
    pub fn new(resolver: EnvironmentResolver) -> Self {
        Self::with_factory(resolver, Arc::new(DefaultChannelFactory::new()))
    }

    /// Create a dispatcher with a custom channel factory
    #[must_use]
    pub fn with_factory(resolver: EnvironmentResolver, factory: Arc<dyn ChannelFactory>) -> Self {
        Self { resolver, factory }
    }

    /// Resolver used for lookups
    pub fn resolver(&self) -> &EnvironmentResolver {
        &self.resolver
    }

    /// Run `command` in `environment` with [`DEFAULT_TIMEOUT`]
    ///
    /// # Errors
    /// See [`Dispatcher::execute`]
    pub async fn execute_default(
        &self,
        environment: &str,
        command: &str,
    ) -> Result<ExecutionResult, ExecError> {
        self.execute(environment, command, DEFAULT_TIMEOUT).await
    }

    /// Run `command` in `environment`
    ///
    /// A non-zero exit status is returned as an unsuccessful result, not an
    /// error. Exactly one attempt is made.
    ///
    /// # Errors
    /// * `InvalidArgument` - empty environment name or command
    /// * `Configuration` - missing/malformed source, unknown environment, or
    ///   a config failing validation
    /// * `SshConnection` / `CommandExecution` - raised by the channel
    #[instrument(skip(self, command))]
    pub async fn execute(
        &self,
        environment: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        if environment.trim().is_empty() {
            return Err(ExecError::InvalidArgument(
                "environment name cannot be empty".to_string(),
            ));
        }
        if command.trim().is_empty() {
            return Err(ExecError::InvalidArgument(
                "command cannot be empty".to_string(),
            ));
        }

        let config = self.host_config(environment)?;
        let channel = self.channel(&config)?;

        info!(
            environment,
            channel = channel.executor_type(),
            command = %command,
            "dispatching command"
        );

        let result = channel.run_with_timeout(command, timeout).await;

        match &result {
            Ok(r) => debug!(
                environment,
                success = r.success,
                exit_code = r.exit_code,
                "command finished"
            ),
            Err(e) => warn!(environment, stage = %e.stage(), error = %e, "command could not run"),
        }

        result
    }

    /// Resolve and validate the configuration for `environment`
    ///
    /// # Errors
    /// Returns `ExecError::Configuration` for every resolution or validation failure
    pub fn host_config(&self, environment: &str) -> Result<HostConfig, ExecError> {
        let config = self.resolver.resolve(environment)?.into_found(environment)?;

        config.validate().map_err(|issues| ConfigError::Invalid {
            name: environment.to_string(),
            issues,
        })?;

        Ok(config)
    }

    fn channel(&self, config: &HostConfig) -> Result<Box<dyn Executor>, ExecError> {
        if config.is_local() {
            Ok(self.factory.local(&config.working_directory))
        } else {
            self.factory.remote(config)
        }
    }
}
