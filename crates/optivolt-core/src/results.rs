//! Structured test results and their persistence

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PersistError;

/// Key holding the unparsed output when metrics are not a JSON object
pub const RAW_OUTPUT_KEY: &str = "raw_output";

/// A single collected metric
///
/// Numbers and text serialize as bare JSON values; raw output is wrapped as
/// `{"raw_output": "..."}` so it reloads as [`Metric::RawOutput`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricRepr", into = "MetricRepr")]
pub enum Metric {
    /// Numeric measurement
    Numeric(f64),
    /// Textual value (nested JSON is kept as its JSON text)
    Text(String),
    /// Output that could not be parsed as metrics
    RawOutput(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MetricRepr {
    Numeric(f64),
    Text(String),
    Raw { raw_output: String },
}

impl From<MetricRepr> for Metric {
    fn from(repr: MetricRepr) -> Self {
        match repr {
            MetricRepr::Numeric(value) => Metric::Numeric(value),
            MetricRepr::Text(text) => Metric::Text(text),
            MetricRepr::Raw { raw_output } => Metric::RawOutput(raw_output),
        }
    }
}

impl From<Metric> for MetricRepr {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Numeric(value) => MetricRepr::Numeric(value),
            Metric::Text(text) => MetricRepr::Text(text),
            Metric::RawOutput(raw_output) => MetricRepr::Raw { raw_output },
        }
    }
}

impl Metric {
    /// Numeric value, if any
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Metric::Numeric(value) => Some(*value),
            Metric::Text(_) | Metric::RawOutput(_) => None,
        }
    }
}

/// Convert command output into metrics
///
/// A JSON object becomes one metric per key. Anything else is kept whole
/// under [`RAW_OUTPUT_KEY`].
#[must_use]
pub fn parse_metrics(output: &str) -> BTreeMap<String, Metric> {
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(output) {
        Ok(object) => object
            .into_iter()
            .map(|(key, value)| {
                let metric = match value {
                    serde_json::Value::Number(n) => match n.as_f64() {
                        Some(f) => Metric::Numeric(f),
                        None => Metric::Text(n.to_string()),
                    },
                    serde_json::Value::String(s) => Metric::Text(s),
                    other => Metric::Text(other.to_string()),
                };
                (key, metric)
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to parse metrics, keeping raw output");
            BTreeMap::from([(
                RAW_OUTPUT_KEY.to_string(),
                Metric::RawOutput(output.to_string()),
            )])
        }
    }
}

/// Outcome of a test or collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    #[default]
    Pending,
    Completed,
    NoData,
    Failed,
    Error,
}

/// Result record for one test type on one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test type (cpu, api, db)
    pub test: String,
    /// Environment name
    pub environment: String,
    pub status: TestStatus,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    /// Create a pending result stamped with the current time
    pub fn new(environment: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            environment: environment.into(),
            status: TestStatus::Pending,
            duration_seconds: 0.0,
            timestamp: Utc::now(),
            metrics: BTreeMap::new(),
            error: None,
        }
    }

    /// Mark completed with the given metrics
    pub fn complete(&mut self, metrics: BTreeMap<String, Metric>) {
        self.status = TestStatus::Completed;
        self.metrics = metrics;
        self.error = None;
    }

    /// Mark with a non-success status and message
    pub fn fail(&mut self, status: TestStatus, error: impl Into<String>) {
        self.status = status;
        self.error = Some(error.into());
    }

    /// Completed without error
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TestStatus::Completed && self.error.is_none()
    }
}

/// Results gathered by one `collect` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collected_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
}

impl CollectionReport {
    #[must_use]
    pub fn new(results: Vec<TestResult>) -> Self {
        Self {
            collected_at: Utc::now(),
            results,
        }
    }
}

/// Write `value` as pretty JSON, creating parent directories
///
/// # Errors
/// Returns `PersistError` on serialization or I/O failure
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
        debug!(dir = %parent.display(), "created result directory");
    }

    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(io_err)?;

    debug!(path = %path.display(), "saved result");
    Ok(())
}

/// Sorted `*.json` files in `dir`; empty when the directory does not exist
///
/// # Errors
/// Returns `PersistError::Io` if the directory exists but cannot be read
pub fn list_result_files(dir: &Path) -> Result<Vec<PathBuf>, PersistError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let io_err = |source| PersistError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_pending() {
        let result = TestResult::new("docker", "cpu");

        assert_eq!(result.status, TestStatus::Pending);
        assert_eq!(result.duration_seconds, 0.0);
        assert!(result.metrics.is_empty());
        assert!(result.error.is_none());
        assert!(!result.is_success());
    }

    #[test]
    fn test_parse_metrics_object() {
        let metrics =
            parse_metrics(r#"{"cpu_avg": 45.5, "memory_mb": 512, "unit": "ms", "ok": true}"#);

        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics["cpu_avg"], Metric::Numeric(45.5));
        assert_eq!(metrics["memory_mb"].as_f64(), Some(512.0));
        assert_eq!(metrics["unit"], Metric::Text("ms".to_string()));
        assert_eq!(metrics["ok"], Metric::Text("true".to_string()));
    }

    #[test]
    fn test_parse_metrics_raw_fallback() {
        let metrics = parse_metrics("cpu: 45%");

        assert_eq!(
            metrics.get(RAW_OUTPUT_KEY),
            Some(&Metric::RawOutput("cpu: 45%".to_string()))
        );
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn test_empty_object_has_no_metrics() {
        assert!(parse_metrics("{}").is_empty());
    }

    #[test]
    fn test_status_transitions() {
        let mut result = TestResult::new("unikernel", "api");
        result.fail(TestStatus::Failed, "Connection refused");
        assert_eq!(result.error.as_deref(), Some("Connection refused"));
        assert!(!result.is_success());

        result.complete(parse_metrics(r#"{"requests_total": 1000}"#));
        assert!(result.is_success());
    }

    #[test]
    fn test_serialized_shape() {
        let mut result = TestResult::new("microvm", "db");
        result.complete(parse_metrics(r#"{"latency_ms": 3.5}"#));

        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["test"], "db");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["metrics"]["latency_ms"], 3.5);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results/run1");

        save_json(&TestResult::new("docker", "cpu"), &nested.join("b.json")).unwrap();
        save_json(&TestResult::new("docker", "api"), &nested.join("a.json")).unwrap();
        std::fs::write(nested.join("notes.txt"), "x").unwrap();

        let files = list_result_files(&nested).unwrap();
        assert_eq!(files, vec![nested.join("a.json"), nested.join("b.json")]);

        let loaded: TestResult =
            serde_json::from_str(&std::fs::read_to_string(&files[1]).unwrap()).unwrap();
        assert_eq!(loaded.test, "cpu");
    }

    #[test]
    fn test_raw_output_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_api_docker.json");
        let mut result = TestResult::new("docker", "api");
        result.complete(parse_metrics("p99=12ms"));
        result.metrics.insert("unit".to_string(), Metric::Text("ms".to_string()));

        save_json(&result, &path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(value["metrics"][RAW_OUTPUT_KEY]["raw_output"], "p99=12ms");
        assert_eq!(value["metrics"]["unit"], "ms");

        let loaded: TestResult = serde_json::from_str(&saved).unwrap();
        assert_eq!(loaded.metrics, result.metrics);
        assert_eq!(
            loaded.metrics[RAW_OUTPUT_KEY],
            Metric::RawOutput("p99=12ms".to_string())
        );
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_result_files(&dir.path().join("absent")).unwrap().is_empty());
    }
}
