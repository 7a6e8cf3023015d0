//! Core error types for optivolt-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or checking environment configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// None of the candidate configuration files exist
    #[error("configuration file not found (searched: {})", display_paths(.searched))]
    SourceMissing {
        /// Candidates that were tried, in order
        searched: Vec<PathBuf>,
    },

    /// Configuration file exists but cannot be read or parsed
    #[error("malformed configuration in {}: {reason}", .path.display())]
    Malformed {
        /// File that failed to load
        path: PathBuf,
        /// Parser or I/O message
        reason: String,
    },

    /// The document is valid but lacks the requested environment
    #[error("environment '{name}' not found (available: {})", .available.join(", "))]
    EnvironmentNotFound {
        /// Requested environment
        name: String,
        /// Environments the document does define
        available: Vec<String>,
    },

    /// The environment exists but its connection parameters are unusable
    #[error("invalid configuration for environment '{name}': {}", display_issues(.issues))]
    Invalid {
        /// Environment name
        name: String,
        /// Every problem found
        issues: Vec<ValidationIssue>,
    },
}

impl ConfigError {
    /// Whether this error came from validating an otherwise loadable config
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, ConfigError::Invalid { .. })
    }
}

/// A single reason a `HostConfig` failed validation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("hostname is empty")]
    EmptyHostname,

    #[error("port {0} is outside 1..=65535")]
    PortOutOfRange(u16),

    #[error("username is empty")]
    EmptyUsername,
}

/// Errors writing or listing result files
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no candidates".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
