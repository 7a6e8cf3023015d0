//! System metrics snapshot of one environment

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use eyre::{WrapErr, bail};
use optivolt_core::save_json;
use optivolt_exec::Dispatcher;
use serde_json::Value;
use tracing::info;

use super::{banner, script_path, stage_failure};

const DEFAULT_SCRIPT: &str = "scripts/collect_metrics.sh";

/// Extra time allowed on top of the sampling duration
const COLLECT_MARGIN: Duration = Duration::from_secs(60);

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Averages printed once a snapshot is saved
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct MetricsSummary {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub duration_seconds: Option<f64>,
}

impl MetricsSummary {
    pub(crate) fn from_document(document: &Value) -> Self {
        let number = |pointer: &str| document.pointer(pointer).and_then(Value::as_f64);
        Self {
            cpu_percent: number("/system_metrics/averages/cpu_usage_percent"),
            memory_percent: number("/system_metrics/averages/memory_usage_percent"),
            duration_seconds: number("/metadata/duration_seconds"),
        }
    }
}

fn display(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v}{unit}"))
}

/// Sample system metrics on `environment` for `duration` seconds and save the
/// collector's JSON under `results_dir`
///
/// The collection script is called as `<script> <environment> <duration>
/// <file>` in the environment's working directory, then `<file>` is read back.
///
/// # Errors
/// Fails if either command could not run or exited non-zero, if the file is
/// not JSON, or if the snapshot cannot be written
pub async fn metrics(
    dispatcher: &Dispatcher,
    environment: &str,
    duration: u64,
    results_dir: &Path,
) -> eyre::Result<PathBuf> {
    banner(&format!("Collecting system metrics: {environment}"));

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let remote_file = format!("metrics_{stamp}.json");
    let script = script_path(dispatcher, environment, "metrics", DEFAULT_SCRIPT);
    let command = format!("bash {script} {environment} {duration} {remote_file}");

    info!(environment, duration, command = %command, "starting metrics collection");
    println!("Sampling for {duration}s...");

    let timeout = Duration::from_secs(duration) + COLLECT_MARGIN;
    let run = dispatcher
        .execute(environment, &command, timeout)
        .await
        .map_err(|e| stage_failure(environment, e))?;
    print!("{}", run.output);

    if !run.success {
        bail!(
            "metrics collection on {environment} failed (exit code {})",
            run.exit_code
        );
    }

    let fetched = dispatcher
        .execute(environment, &format!("cat {remote_file}"), FETCH_TIMEOUT)
        .await
        .map_err(|e| stage_failure(environment, e))?;
    if !fetched.success {
        bail!(
            "cannot read {remote_file} on {environment}: {}",
            fetched.output.trim()
        );
    }

    let document: Value = serde_json::from_str(fetched.output.trim())
        .wrap_err_with(|| format!("{remote_file} on {environment} is not valid JSON"))?;

    let path = results_dir.join(format!("{environment}_metrics_{stamp}.json"));
    save_json(&document, &path).wrap_err_with(|| format!("failed to save {}", path.display()))?;
    println!("Metrics saved to {}", path.display());

    let summary = MetricsSummary::from_document(&document);
    println!();
    banner("Metrics summary");
    println!("CPU average:    {}", display(summary.cpu_percent, "%"));
    println!("Memory average: {}", display(summary.memory_percent, "%"));
    println!("Duration:       {}", display(summary.duration_seconds, "s"));

    Ok(path)
}
