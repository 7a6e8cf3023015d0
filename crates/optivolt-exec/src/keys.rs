//! SSH credential selection and resolution

use std::path::{Path, PathBuf};

use optivolt_core::CURRENT_USER;
use tracing::{debug, warn};

use crate::error::ConnectFailure;

/// Explicit authentication override: `key`, `agent` or `none`
pub const AUTH_OVERRIDE_ENV_VAR: &str = "OPTIVOLT_SSH_AUTH";

/// Variables whose presence marks an automated pipeline
pub const PIPELINE_ENV_VARS: [&str; 2] = ["CI", "OPTIVOLT_PIPELINE"];

/// Agent socket indicator
pub const AGENT_SOCKET_ENV_VAR: &str = "SSH_AUTH_SOCK";

const USER_ENV_VARS: [&str; 3] = ["USER", "LOGNAME", "USERNAME"];

/// How the SSH channel authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Private key file (already tilde-expanded)
    KeyFile(PathBuf),
    /// Keys held by a running SSH agent
    Agent,
    /// Empty credential (`none` method)
    None,
}

impl CredentialSource {
    /// Select a source from the process environment
    #[must_use]
    pub fn select(credential_ref: &str) -> Self {
        Self::select_with(credential_ref, |name| std::env::var(name).ok())
    }

    /// Select a source using `lookup` to read environment variables
    ///
    /// An explicit [`AUTH_OVERRIDE_ENV_VAR`] wins. Otherwise, inside a
    /// pipeline the agent is used when its socket is advertised and the empty
    /// credential when it is not. Everywhere else the key file is used.
    pub fn select_with<F>(credential_ref: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_set = |name: &str| {
            lookup(name).is_some_and(|value| {
                let value = value.trim();
                !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
            })
        };

        if let Some(mode) = lookup(AUTH_OVERRIDE_ENV_VAR) {
            match mode.trim().to_ascii_lowercase().as_str() {
                "key" => return Self::KeyFile(expand_tilde(credential_ref)),
                "agent" => return Self::Agent,
                "none" => return Self::None,
                other => warn!(mode = other, "ignoring unknown OPTIVOLT_SSH_AUTH value"),
            }
        }

        if PIPELINE_ENV_VARS.iter().any(|name| is_set(*name)) {
            let source = if is_set(AGENT_SOCKET_ENV_VAR) {
                Self::Agent
            } else {
                Self::None
            };
            debug!(source = source.kind(), "pipeline detected, skipping key file");
            return source;
        }

        Self::KeyFile(expand_tilde(credential_ref))
    }

    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::KeyFile(_) => "key",
            CredentialSource::Agent => "agent",
            CredentialSource::None => "none",
        }
    }

    /// Check that the key file exists, without touching the network
    ///
    /// # Errors
    /// Returns `ConnectFailure::KeyMissing` for an absent key file
    pub fn ensure_available(&self) -> Result<(), ConnectFailure> {
        if let CredentialSource::KeyFile(path) = self {
            if !path.is_file() {
                return Err(ConnectFailure::KeyMissing(path.display().to_string()));
            }
            warn_if_permissions_open(path);
        }
        Ok(())
    }
}

/// Expand a leading `~` to the invoking user's home directory
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Resolve the `"current"` sentinel to the invoking user's name
///
/// # Errors
/// Returns `ConnectFailure::Credentials` when the local user cannot be determined
pub fn resolve_username(username: &str) -> Result<String, ConnectFailure> {
    resolve_username_with(username, |name| std::env::var(name).ok())
}

fn resolve_username_with<F>(username: &str, lookup: F) -> Result<String, ConnectFailure>
where
    F: Fn(&str) -> Option<String>,
{
    if username != CURRENT_USER {
        return Ok(username.to_string());
    }

    USER_ENV_VARS
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|value| !value.trim().is_empty())
        .ok_or_else(|| ConnectFailure::Credentials("cannot determine current user".to_string()))
}

#[cfg(unix)]
fn warn_if_permissions_open(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        // group/other bits
        if metadata.permissions().mode() & 0o77 != 0 {
            warn!(path = %path.display(), "private key permissions are too open (should be 600)");
        }
    }
}

#[cfg(not(unix))]
fn warn_if_permissions_open(_path: &Path) {}
