//! Performance test runs

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{WrapErr, bail};
use optivolt_core::save_json;
use optivolt_exec::{Dispatcher, Stage};
use tracing::{error, info};

use super::{banner, stage_failure};
use crate::cli::TestSelection;
use crate::metrics::MetricsCollector;

/// Extra time allowed on top of the requested test duration
const TIMEOUT_MARGIN: Duration = Duration::from_secs(60);

/// Result file written for one test
pub(crate) fn result_path(output_dir: &Path, test_type: &str, environment: &str) -> PathBuf {
    output_dir.join(format!("test_{test_type}_{environment}.json"))
}

/// Failures that no later test could avoid
fn is_setup_failure(stage: Stage) -> bool {
    matches!(stage, Stage::Argument | Stage::Resolution | Stage::Validation)
}

/// Run the selected benchmarks on `environment`, saving metrics of each
/// successful run
///
/// Configuration problems abort immediately; a failing test is reported and
/// the remaining tests still run.
///
/// # Errors
/// Fails on configuration problems, when saving results fails, or when any
/// test failed
pub async fn run_tests(
    dispatcher: &Dispatcher,
    environment: &str,
    selection: TestSelection,
    duration: u64,
    output_dir: &Path,
) -> eyre::Result<()> {
    banner(&format!(
        "Running tests: {selection:?}\nEnvironment: {environment}\nDuration: {duration}s"
    ));

    let collector = MetricsCollector::new(dispatcher);
    let timeout = Duration::from_secs(duration) + TIMEOUT_MARGIN;
    let mut failed = Vec::new();

    for &test_type in selection.test_types() {
        println!("\n> Test: {test_type}");

        let command = format!("bash scripts/run_test_{test_type}.sh {duration}");
        info!(environment, test_type, "starting test");

        match dispatcher.execute(environment, &command, timeout).await {
            Ok(run) if run.success => {
                println!("Test {test_type} finished");

                let mut result = collector.collect(environment, test_type).await;
                result.duration_seconds = duration as f64;

                let path = result_path(output_dir, test_type, environment);
                save_json(&result, &path)
                    .wrap_err_with(|| format!("failed to save {}", path.display()))?;
                println!("Results saved to {}", path.display());
            }
            Ok(run) => {
                println!("Test {test_type} failed (exit code {})", run.exit_code);
                println!("{}", run.output);
                failed.push(test_type);
            }
            Err(e) if is_setup_failure(e.stage()) => {
                return Err(stage_failure(environment, e));
            }
            Err(e) => {
                error!(
                    environment,
                    test_type,
                    stage = %e.stage(),
                    error = %e,
                    "test could not run"
                );
                println!("Test {test_type} could not run: {e}");
                failed.push(test_type);
            }
        }
    }

    println!();
    banner("Tests finished");

    if !failed.is_empty() {
        bail!("{} test(s) failed on {environment}: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
