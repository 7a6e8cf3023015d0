//! optivolt-core: environment configuration and result records
//!
//! Provides `HostConfig`, validation, localhost classification, the
//! environment resolver and the structured test result types.

pub mod config;
pub mod error;
pub mod resolver;
pub mod results;

pub use config::{CURRENT_USER, ConfigDocument, DEFAULT_PORT, HostConfig, is_local};
pub use error::{ConfigError, PersistError, ValidationIssue};
pub use resolver::{EnvironmentResolver, Resolution};
pub use results::{
    CollectionReport, Metric, RAW_OUTPUT_KEY, TestResult, TestStatus, list_result_files,
    parse_metrics, save_json,
};
