//! Metrics collection from environments

use optivolt_core::{TestResult, TestStatus, parse_metrics};
use optivolt_exec::Dispatcher;
use tracing::{error, info, warn};

/// Benchmarks deployed to every environment
pub const TEST_TYPES: [&str; 3] = ["cpu", "api", "db"];

/// Environments covered by `--environment all`
pub const ALL_ENVIRONMENTS: [&str; 3] = ["docker", "microvm", "unikernel"];

/// Reads benchmark result files through the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> MetricsCollector<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Collect the metrics file of `test_type` from `environment`
    ///
    /// Never fails: problems are recorded in the returned result's status.
    pub async fn collect(&self, environment: &str, test_type: &str) -> TestResult {
        let mut result = TestResult::new(environment, test_type);

        info!(environment, test_type, "collecting metrics");

        let command = format!("cat {test_type}_results.json 2>/dev/null || echo '{{}}'");

        match self.dispatcher.execute_default(environment, &command).await {
            Ok(output) if output.success && !output.output.trim().is_empty() => {
                let metrics = parse_metrics(output.output.trim());
                if metrics.is_empty() {
                    warn!(environment, test_type, "metrics file is empty");
                    result.fail(TestStatus::NoData, "No metrics available");
                } else {
                    info!(count = metrics.len(), "collected metrics");
                    result.complete(metrics);
                }
            }
            Ok(_) => {
                warn!(environment, test_type, "no metrics data found");
                result.fail(TestStatus::NoData, "No metrics available");
            }
            Err(e) => {
                error!(
                    environment,
                    test_type,
                    stage = %e.stage(),
                    error = %e,
                    "failed to collect metrics"
                );
                result.fail(TestStatus::Error, e.to_string());
            }
        }

        result
    }
}
