//! Metrics collection across environments

use std::path::Path;

use eyre::WrapErr;
use optivolt_core::{CollectionReport, save_json};
use optivolt_exec::Dispatcher;

use super::banner;
use crate::metrics::{ALL_ENVIRONMENTS, MetricsCollector, TEST_TYPES};

/// Collect every test type from `environment` (or every known environment
/// for `all`)
pub(crate) async fn gather(dispatcher: &Dispatcher, environment: &str) -> CollectionReport {
    let environments: Vec<&str> = if environment == "all" {
        ALL_ENVIRONMENTS.to_vec()
    } else {
        vec![environment]
    };

    let collector = MetricsCollector::new(dispatcher);
    let mut results = Vec::new();

    for env in environments {
        println!("\nEnvironment: {env}");
        for test_type in TEST_TYPES {
            results.push(collector.collect(env, test_type).await);
        }
    }

    CollectionReport::new(results)
}

/// Collect metrics and write them to `output`
///
/// # Errors
/// Fails only if the report cannot be written
pub async fn collect(
    dispatcher: &Dispatcher,
    environment: &str,
    output: &Path,
) -> eyre::Result<()> {
    banner("Collecting metrics");

    let report = gather(dispatcher, environment).await;

    save_json(&report, output)
        .wrap_err_with(|| format!("failed to save collected metrics to {}", output.display()))?;

    let completed = report.results.iter().filter(|r| r.is_success()).count();
    println!("\nMetrics collected: {}", output.display());
    println!("Total: {} results ({completed} completed)", report.results.len());
    Ok(())
}
