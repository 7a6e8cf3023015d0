//! Environment name to `HostConfig` resolution
//!
//! The resolver is built from an explicit, ordered list of candidate
//! configuration files. Every lookup re-reads the first candidate that
//! exists; nothing is cached between calls.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::{ConfigDocument, HostConfig};
use crate::error::ConfigError;

/// Environment variable that points at an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "OPTIVOLT_CONFIG";

/// Outcome of looking up one environment in a well-formed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The environment is configured
    Found(HostConfig),
    /// The document does not define the environment
    NotFound {
        /// Environments the document does define
        available: Vec<String>,
    },
}

impl Resolution {
    /// Convert `NotFound` into [`ConfigError::EnvironmentNotFound`]
    ///
    /// # Errors
    /// Returns `EnvironmentNotFound` when the environment is absent
    pub fn into_found(self, name: &str) -> Result<HostConfig, ConfigError> {
        match self {
            Resolution::Found(config) => Ok(config),
            Resolution::NotFound { available } => Err(ConfigError::EnvironmentNotFound {
                name: name.to_string(),
                available,
            }),
        }
    }
}

/// Maps environment names to connection parameters
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    candidates: Vec<PathBuf>,
}

impl EnvironmentResolver {
    /// Create a resolver trying `candidates` in order
    pub fn new(candidates: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a resolver over the standard search locations
    ///
    /// Order: `$OPTIVOLT_CONFIG`, `./config/hosts.json`, `./hosts.json`,
    /// `~/optivolt-automation/config/hosts.json`, `<config dir>/optivolt/hosts.json`.
    #[must_use]
    pub fn from_default_locations() -> Self {
        let mut candidates = Vec::new();

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            candidates.push(PathBuf::from(path));
        }

        candidates.push(PathBuf::from("config/hosts.json"));
        candidates.push(PathBuf::from("hosts.json"));

        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join("optivolt-automation/config/hosts.json"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("optivolt/hosts.json"));
        }

        Self::new(candidates)
    }

    /// Candidate paths, in search order
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists on disk
    ///
    /// # Errors
    /// Returns `SourceMissing` if no candidate exists
    pub fn source(&self) -> Result<&Path, ConfigError> {
        self.candidates
            .iter()
            .find(|path| path.is_file())
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::SourceMissing {
                searched: self.candidates.clone(),
            })
    }

    /// Load and parse the whole configuration document
    ///
    /// # Errors
    /// Returns `SourceMissing` or `Malformed`
    pub fn document(&self) -> Result<ConfigDocument, ConfigError> {
        let path = self.source()?;
        debug!(path = %path.display(), "loading environment configuration");
        load_document(path)
    }

    /// Look up one environment
    ///
    /// # Errors
    /// Returns `SourceMissing` or `Malformed`; an unknown name is `Ok(NotFound)`
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, environment: &str) -> Result<Resolution, ConfigError> {
        let mut document = self.document()?;

        match document.environments.remove(environment) {
            Some(config) => Ok(Resolution::Found(config)),
            None => {
                debug!(environment, "environment not present in configuration");
                Ok(Resolution::NotFound {
                    available: document.environment_names(),
                })
            }
        }
    }

    /// Names of all configured environments
    ///
    /// # Errors
    /// Returns `SourceMissing` or `Malformed`
    pub fn environments(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.document()?.environment_names())
    }
}

fn load_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let malformed = |reason: String| ConfigError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&content).map_err(|e| malformed(e.to_string()))
    } else {
        serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))
    }
}
