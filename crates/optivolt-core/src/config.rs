//! Configuration types for target environments

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;

/// Username sentinel that resolves to the invoking local user
pub const CURRENT_USER: &str = "current";

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default private key location, tilde-expanded at use time
pub const DEFAULT_CREDENTIAL_REF: &str = "~/.ssh/id_rsa";

const LOCAL_HOSTNAMES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Connection parameters for a single target environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Logical name, used for local-vs-remote classification
    #[serde(default)]
    pub hostname: String,
    /// Address dialed for remote execution (falls back to `hostname` when empty)
    #[serde(default, alias = "ip", alias = "addr")]
    pub address: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Remote principal, or [`CURRENT_USER`]
    #[serde(default, alias = "user")]
    pub username: String,
    /// Path to the private key
    #[serde(
        rename = "privateKeyPath",
        alias = "credentialRef",
        alias = "sshKey",
        default = "default_credential_ref"
    )]
    pub credential_ref: String,
    /// Directory commands run in
    #[serde(default, alias = "workdir")]
    pub working_directory: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_credential_ref() -> String {
    DEFAULT_CREDENTIAL_REF.to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            address: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            credential_ref: default_credential_ref(),
            working_directory: String::new(),
        }
    }
}

impl HostConfig {
    /// Create a config with the required fields and defaults for the rest
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set the dialed address
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set private key path
    #[must_use]
    pub fn with_credential_ref(mut self, path: impl Into<String>) -> Self {
        self.credential_ref = path.into();
        self
    }

    /// Set working directory
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Check the config, collecting every problem found
    ///
    /// # Errors
    /// Returns the list of issues when the config must not reach a channel
    pub fn validate(&self) -> Result<(), Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        if self.hostname.trim().is_empty() {
            issues.push(ValidationIssue::EmptyHostname);
        }
        if self.port == 0 {
            issues.push(ValidationIssue::PortOutOfRange(self.port));
        }
        if self.username.trim().is_empty() {
            issues.push(ValidationIssue::EmptyUsername);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Whether [`HostConfig::validate`] passes
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Whether this environment runs on the local machine
    #[must_use]
    pub fn is_local(&self) -> bool {
        is_local(&self.hostname)
    }

    /// Address to dial, falling back to the hostname
    #[must_use]
    pub fn dial_address(&self) -> &str {
        if self.address.trim().is_empty() {
            &self.hostname
        } else {
            &self.address
        }
    }

    /// Whether the username is the [`CURRENT_USER`] sentinel
    #[must_use]
    pub fn uses_current_user(&self) -> bool {
        self.username == CURRENT_USER
    }
}

/// Case-insensitive match against the loopback names
#[must_use]
pub fn is_local(hostname: &str) -> bool {
    LOCAL_HOSTNAMES
        .iter()
        .any(|local| hostname.eq_ignore_ascii_case(local))
}

/// Parsed configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Environment name to connection parameters
    #[serde(alias = "hosts")]
    pub environments: BTreeMap<String, HostConfig>,
    /// Optional script overrides keyed by `<environment>_<action>`
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl ConfigDocument {
    /// Names of all configured environments, sorted
    #[must_use]
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Script override for an environment action, e.g. `docker_deploy`
    #[must_use]
    pub fn script(&self, environment: &str, action: &str) -> Option<&str> {
        self.scripts
            .get(&format!("{environment}_{action}"))
            .map(String::as_str)
    }
}
