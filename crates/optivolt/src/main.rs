//! optivolt CLI
//!
//! Deploys benchmark environments, runs performance tests and collects their
//! metrics, locally or over SSH

use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use optivolt_core::EnvironmentResolver;
use optivolt_exec::Dispatcher;

mod cli;
mod logging;
mod metrics;
mod workflow;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    let resolver = if cli.config.is_empty() {
        EnvironmentResolver::from_default_locations()
    } else {
        EnvironmentResolver::new(cli.config)
    };
    tracing::debug!(candidates = ?resolver.candidates(), "configuration search path");

    let dispatcher = Dispatcher::new(resolver);

    match cli.command {
        Commands::Deploy { environment } => workflow::deploy(&dispatcher, &environment).await,
        Commands::Test {
            environment,
            test_type,
            duration,
            output_dir,
        } => {
            workflow::run_tests(&dispatcher, &environment, test_type, duration, &output_dir).await
        }
        Commands::Collect {
            environment,
            output,
        } => workflow::collect(&dispatcher, &environment, &output).await,
        Commands::Metrics {
            environment,
            duration,
            results_dir,
        } => {
            let results_dir = results_dir.unwrap_or_else(workflow::default_results_dir);
            workflow::metrics(&dispatcher, &environment, duration, &results_dir)
                .await
                .map(drop)
        }
        Commands::Status => workflow::status(dispatcher.resolver()),
        Commands::Report { results_dir } => workflow::report(results_dir.as_deref()),
        Commands::Exec {
            environment,
            timeout,
            command,
        } => {
            workflow::exec(
                &dispatcher,
                &environment,
                &command,
                Duration::from_secs(timeout),
            )
            .await
        }
    }
}
