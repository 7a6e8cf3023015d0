//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use optivolt_core::HostConfig;
#[cfg(unix)]
use russh::keys::agent::client::AgentClient;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ConnectFailure, ExecError, INTERNAL_EXIT_CODE};
use crate::keys::{CredentialSource, resolve_username};
use crate::result::ExecutionResult;
use crate::traits::Executor;

/// Upper bound on TCP connect plus SSH handshake, and separately on authentication
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// SSH command executor
///
/// Every call opens its own session, authenticates, runs one command and
/// disconnects. Nothing is kept between calls.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: HostConfig,
    credentials: CredentialSource,
    connect_timeout: Duration,
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// # Arguments
    /// * `config` - Connection details (address, port, user, working directory)
    /// * `credentials` - How to authenticate, selected once by the caller
    #[must_use]
    pub fn new(config: HostConfig, credentials: CredentialSource) -> Self {
        Self {
            config,
            credentials,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Get connection config
    pub fn host_config(&self) -> &HostConfig {
        &self.config
    }

    /// Credential source in use
    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    /// Command as sent to the server, prefixed with a directory change
    #[must_use]
    pub fn remote_command(&self, cmd: &str) -> String {
        let dir = self.config.working_directory.trim();
        if dir.is_empty() {
            cmd.to_string()
        } else {
            format!("cd {} && {cmd}", shell_quote(dir))
        }
    }

    fn host(&self) -> &str {
        self.config.dial_address()
    }

    fn connection_error(&self, reason: ConnectFailure) -> ExecError {
        error!(
            host = %self.host(),
            port = self.config.port,
            reason = %reason,
            "SSH connection failed"
        );
        ExecError::SshConnection {
            host: self.host().to_string(),
            port: self.config.port,
            reason,
        }
    }

    /// Run a connection step, failing with `ConnectFailure::Timeout` once
    /// the connect timeout elapses
    async fn within_connect_timeout<T>(
        &self,
        step: impl Future<Output = Result<T, ExecError>>,
    ) -> Result<T, ExecError> {
        match timeout(self.connect_timeout, step).await {
            Ok(outcome) => outcome,
            Err(_) => Err(self.connection_error(ConnectFailure::Timeout(self.connect_timeout))),
        }
    }

    /// Open the transport session
    async fn connect(&self) -> Result<client::Handle<SshClientHandler>, ExecError> {
        info!(
            host = %self.host(),
            port = self.config.port,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());
        let connecting = async {
            client::connect(config, (self.host(), self.config.port), SshClientHandler)
                .await
                .map_err(|e| self.connection_error(ConnectFailure::Connect(e.to_string())))
        };

        self.within_connect_timeout(connecting).await
    }

    /// Authenticate with the selected credential source
    async fn authenticate(
        &self,
        session: &mut client::Handle<SshClientHandler>,
        user: &str,
    ) -> Result<(), ExecError> {
        let rejected = |e: String| self.connection_error(ConnectFailure::Authentication(e));

        let accepted = match &self.credentials {
            CredentialSource::KeyFile(key_path) => {
                let key_pair = load_secret_key(key_path, None).map_err(|e| {
                    self.connection_error(ConnectFailure::Credentials(format!(
                        "cannot load {}: {e}",
                        key_path.display()
                    )))
                })?;

                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                session
                    .authenticate_publickey(
                        user,
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                    )
                    .await
                    .map_err(|e| rejected(e.to_string()))?
                    .success()
            }
            CredentialSource::Agent => self.authenticate_with_agent(session, user).await?,
            CredentialSource::None => session
                .authenticate_none(user)
                .await
                .map_err(|e| rejected(e.to_string()))?
                .success(),
        };

        if !accepted {
            return Err(rejected(format!(
                "server rejected {} credentials for {user}",
                self.credentials.kind()
            )));
        }

        info!(
            host = %self.host(),
            user,
            method = self.credentials.kind(),
            "SSH connected and authenticated"
        );
        Ok(())
    }

    /// Try each identity held by the agent until one is accepted
    #[cfg(unix)]
    async fn authenticate_with_agent(
        &self,
        session: &mut client::Handle<SshClientHandler>,
        user: &str,
    ) -> Result<bool, ExecError> {
        let credentials = |e: String| self.connection_error(ConnectFailure::Credentials(e));

        let mut agent = AgentClient::connect_env()
            .await
            .map_err(|e| credentials(format!("cannot reach SSH agent: {e}")))?;
        let identities = agent
            .request_identities()
            .await
            .map_err(|e| credentials(format!("SSH agent did not list identities: {e}")))?;

        if identities.is_empty() {
            return Err(credentials("SSH agent holds no identities".to_string()));
        }

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();

        for key in identities {
            let res = session
                .authenticate_publickey_with(user, key, hash_alg, &mut agent)
                .await
                .map_err(|e| {
                    self.connection_error(ConnectFailure::Authentication(e.to_string()))
                })?;
            if res.success() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    #[cfg(not(unix))]
    async fn authenticate_with_agent(
        &self,
        _session: &mut client::Handle<SshClientHandler>,
        _user: &str,
    ) -> Result<bool, ExecError> {
        Err(self.connection_error(ConnectFailure::Credentials(
            "SSH agent authentication requires a unix socket".to_string(),
        )))
    }

    /// Execute command on remote host
    #[instrument(skip(self, session), fields(host = %self.host()))]
    async fn execute_remote(
        &self,
        session: &mut client::Handle<SshClientHandler>,
        cmd: &str,
    ) -> Result<ExecutionResult, ExecError> {
        let remote_cmd = self.remote_command(cmd);
        debug!(command = %remote_cmd, "executing remote command");

        let start = Instant::now();

        // Open session channel
        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::command(cmd, format!("failed to open channel: {e}")))?;

        // Execute command
        channel
            .exec(true, remote_cmd.as_str())
            .await
            .map_err(|e| ExecError::command(cmd, format!("failed to start command: {e}")))?;

        // Collect output until the server closes the channel
        let mut status = None;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        // stderr
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = Some(i32::try_from(exit_status).unwrap_or(INTERNAL_EXIT_CODE));
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    warn!(command = %cmd, signal = ?signal_name, "remote command killed by signal");
                    status = Some(INTERNAL_EXIT_CODE);
                }
                _ => {}
            }
        }

        let Some(status) = status else {
            return Err(ExecError::command(
                cmd,
                "channel closed without exit status",
            ));
        };

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(ExecutionResult::from_streams(status, &stdout, &stderr, duration))
    }

    /// Disconnect from remote host
    async fn disconnect(&self, session: client::Handle<SshClientHandler>) {
        match session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            Ok(()) => info!(host = %self.host(), "SSH disconnected"),
            Err(e) => warn!(host = %self.host(), error = %e, "SSH disconnect failed"),
        }
    }
}

#[async_trait]
impl Executor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.host(), port = self.config.port))]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let start = Instant::now();

        self.credentials
            .ensure_available()
            .map_err(|reason| self.connection_error(reason))?;
        let user = resolve_username(&self.config.username)
            .map_err(|reason| self.connection_error(reason))?;

        let mut session = self.connect().await?;

        let authenticated = self
            .within_connect_timeout(self.authenticate(&mut session, &user))
            .await;
        let outcome = match authenticated {
            Ok(()) => {
                debug!(command = %cmd, timeout = ?timeout_duration, "executing with timeout");
                match timeout(timeout_duration, self.execute_remote(&mut session, cmd)).await {
                    Ok(result) => result,
                    Err(_) => {
                        error!(
                            command = %cmd,
                            timeout = ?timeout_duration,
                            elapsed = ?start.elapsed(),
                            "command timed out"
                        );
                        Err(ExecError::timeout(cmd, timeout_duration))
                    }
                }
            }
            Err(e) => Err(e),
        };

        self.disconnect(session).await;
        outcome
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Quote `value` for a POSIX shell unless it only holds safe characters
fn shell_quote(value: &str) -> String {
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-~+:@%,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
