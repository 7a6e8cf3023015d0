use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use optivolt_core::{ConfigError, EnvironmentResolver, HostConfig, ValidationIssue};
use optivolt_exec::*;
use tempfile::TempDir;

// Mock implementations
#[derive(Default)]
struct RecordingFactory {
    local_opened: AtomicUsize,
    remote_opened: AtomicUsize,
    working_dirs: Mutex<Vec<String>>,
    remote_hosts: Mutex<Vec<String>>,
}

impl RecordingFactory {
    fn opened(&self) -> usize {
        self.local_opened.load(Ordering::SeqCst) + self.remote_opened.load(Ordering::SeqCst)
    }
}

struct MockExecutor {
    kind: &'static str,
    outcome: Result<ExecutionResult, ExecError>,
}

#[async_trait]
impl Executor for MockExecutor {
    async fn run_with_timeout(
        &self,
        _cmd: &str,
        _timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        self.outcome.clone()
    }

    fn executor_type(&self) -> &'static str {
        self.kind
    }
}

impl ChannelFactory for RecordingFactory {
    fn local(&self, working_directory: &str) -> Box<dyn Executor> {
        self.local_opened.fetch_add(1, Ordering::SeqCst);
        self.working_dirs
            .lock()
            .unwrap()
            .push(working_directory.to_string());
        Box::new(MockExecutor {
            kind: "mock-local",
            outcome: Ok(ExecutionResult::from_streams(0, "local\n", "", Duration::ZERO)),
        })
    }

    fn remote(&self, config: &HostConfig) -> Result<Box<dyn Executor>, ExecError> {
        self.remote_opened.fetch_add(1, Ordering::SeqCst);
        self.remote_hosts
            .lock()
            .unwrap()
            .push(config.dial_address().to_string());
        Ok(Box::new(MockExecutor {
            kind: "mock-ssh",
            outcome: Err(ExecError::SshConnection {
                host: config.dial_address().to_string(),
                port: config.port,
                reason: ConnectFailure::Connect("connection refused".to_string()),
            }),
        }))
    }
}

const HOSTS_JSON: &str = r#"{
    "environments": {
        "docker": { "hostname": "localhost", "port": 22, "user": "root", "workdir": "/tmp" },
        "microvm": { "hostname": "microvm", "ip": "10.0.0.5", "port": 2222, "user": "root", "workdir": "/opt/bench" },
        "broken-port": { "hostname": "10.0.0.6", "port": 0, "user": "root" },
        "no-user": { "hostname": "10.0.0.7", "user": "" },
        "no-host": { "hostname": "", "user": "root" }
    }
}"#;

fn config_file(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("hosts.json");
    std::fs::write(&path, content).unwrap();
    path
}

fn mocked(dir: &TempDir) -> (Dispatcher, Arc<RecordingFactory>) {
    let factory = Arc::new(RecordingFactory::default());
    let resolver = EnvironmentResolver::new([config_file(dir, HOSTS_JSON)]);
    (Dispatcher::with_factory(resolver, factory.clone()), factory)
}

#[tokio::test]
async fn test_empty_arguments_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (dispatcher, factory) = mocked(&dir);

    let err = dispatcher.execute_default("", "pwd").await.unwrap_err();
    assert!(matches!(err, ExecError::InvalidArgument(_)));
    assert_eq!(err.stage(), Stage::Argument);

    let err = dispatcher.execute_default("docker", "  ").await.unwrap_err();
    assert!(matches!(err, ExecError::InvalidArgument(_)));

    assert_eq!(factory.opened(), 0);
}

#[tokio::test]
async fn test_localhost_routes_to_local_channel() {
    let dir = TempDir::new().unwrap();
    let (dispatcher, factory) = mocked(&dir);

    let result = dispatcher.execute_default("docker", "pwd").await.unwrap();

    assert_eq!(result.output, "local\n");
    assert_eq!(factory.local_opened.load(Ordering::SeqCst), 1);
    assert_eq!(factory.remote_opened.load(Ordering::SeqCst), 0);
    assert_eq!(*factory.working_dirs.lock().unwrap(), vec!["/tmp".to_string()]);
}

#[tokio::test]
async fn test_remote_errors_propagate_unchanged() {
    let dir = TempDir::new().unwrap();
    let (dispatcher, factory) = mocked(&dir);

    let err = dispatcher.execute_default("microvm", "uptime").await.unwrap_err();

    match err {
        ExecError::SshConnection { ref host, port, .. } => {
            assert_eq!(host, "10.0.0.5");
            assert_eq!(port, 2222);
        }
        ref other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.stage(), Stage::Connection);
    assert_eq!(factory.remote_opened.load(Ordering::SeqCst), 1);
    assert_eq!(*factory.remote_hosts.lock().unwrap(), vec!["10.0.0.5".to_string()]);
}

#[tokio::test]
async fn test_invalid_configs_never_open_a_channel() {
    let dir = TempDir::new().unwrap();
    let (dispatcher, factory) = mocked(&dir);

    let cases = [
        ("broken-port", ValidationIssue::PortOutOfRange(0)),
        ("no-user", ValidationIssue::EmptyUsername),
        ("no-host", ValidationIssue::EmptyHostname),
    ];

    for (environment, expected) in cases {
        let err = dispatcher.execute_default(environment, "true").await.unwrap_err();

        assert_eq!(err.stage(), Stage::Validation, "{environment}");
        match err {
            ExecError::Configuration(ConfigError::Invalid { name, issues }) => {
                assert_eq!(name, environment);
                assert_eq!(issues, vec![expected]);
            }
            other => panic!("unexpected error for {environment}: {other}"),
        }
    }

    assert_eq!(factory.opened(), 0);
}

#[tokio::test]
async fn test_unknown_environment_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let (dispatcher, factory) = mocked(&dir);

    let err = dispatcher.execute_default("unikernel", "true").await.unwrap_err();

    assert_eq!(err.stage(), Stage::Resolution);
    match err {
        ExecError::Configuration(ConfigError::EnvironmentNotFound { name, available }) => {
            assert_eq!(name, "unikernel");
            assert!(available.contains(&"docker".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(factory.opened(), 0);
}

#[tokio::test]
async fn test_missing_source_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(RecordingFactory::default());
    let resolver = EnvironmentResolver::new([dir.path().join("absent.json")]);
    let dispatcher = Dispatcher::with_factory(resolver, factory.clone());

    let err = dispatcher.execute_default("docker", "pwd").await.unwrap_err();

    assert!(matches!(
        err,
        ExecError::Configuration(ConfigError::SourceMissing { .. })
    ));
    assert_eq!(factory.opened(), 0);
}

#[tokio::test]
async fn test_malformed_source_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let resolver = EnvironmentResolver::new([config_file(&dir, "{ invalid json }")]);
    let dispatcher = Dispatcher::new(resolver);

    let err = dispatcher.execute_default("docker", "pwd").await.unwrap_err();

    assert!(matches!(
        err,
        ExecError::Configuration(ConfigError::Malformed { .. })
    ));
    assert_eq!(err.stage(), Stage::Resolution);
}

// Real channels from here on

#[tokio::test]
async fn test_end_to_end_local_pwd() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(EnvironmentResolver::new([config_file(&dir, HOSTS_JSON)]));

    let result = dispatcher
        .execute("docker", "pwd", Duration::from_secs(10))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.output, "/tmp\n");
}

#[tokio::test]
async fn test_end_to_end_nonzero_exit_is_a_result() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(EnvironmentResolver::new([config_file(&dir, HOSTS_JSON)]));

    let result = dispatcher
        .execute("docker", "echo nope >&2; exit 3", Duration::from_secs(10))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.output, "\nnope\n");
}

#[tokio::test]
async fn test_end_to_end_local_timeout() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(EnvironmentResolver::new([config_file(&dir, HOSTS_JSON)]));

    let err = dispatcher
        .execute("docker", "sleep 10", Duration::from_secs(1))
        .await
        .unwrap_err();

    match err {
        ExecError::CommandExecution {
            command, exit_code, ..
        } => {
            assert_eq!(command, "sleep 10");
            assert_eq!(exit_code, INTERNAL_EXIT_CODE);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_end_to_end_unreachable_remote() {
    let dir = TempDir::new().unwrap();
    let key = dir.path().join("id_test");
    std::fs::write(&key, "not a real key").unwrap();

    let hosts = format!(
        r#"{{
            "environments": {{
                "unikernel": {{
                    "hostname": "unikernel",
                    "address": "127.0.0.1",
                    "port": 1,
                    "username": "root",
                    "privateKeyPath": "{}",
                    "workingDirectory": "/opt/bench"
                }}
            }}
        }}"#,
        key.display()
    );
    let resolver = EnvironmentResolver::new([config_file(&dir, &hosts)]);
    let factory: Arc<dyn ChannelFactory> = Arc::new(KeyFileFactory);
    let dispatcher = Dispatcher::with_factory(resolver, factory);

    let err = dispatcher
        .execute("unikernel", "true", Duration::from_secs(5))
        .await
        .unwrap_err();

    match err {
        ExecError::SshConnection { host, port, .. } => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(port, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Real channels with the key file forced, independent of CI variables
struct KeyFileFactory;

impl ChannelFactory for KeyFileFactory {
    fn local(&self, working_directory: &str) -> Box<dyn Executor> {
        Box::new(LocalExecutor::in_directory(working_directory))
    }

    fn remote(&self, config: &HostConfig) -> Result<Box<dyn Executor>, ExecError> {
        let credentials = CredentialSource::KeyFile(PathBuf::from(&config.credential_ref));
        Ok(Box::new(
            SshExecutor::new(config.clone(), credentials)
                .with_connect_timeout(Duration::from_secs(5)),
        ))
    }
}

#[tokio::test]
async fn test_concurrent_dispatches() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::new(EnvironmentResolver::new([config_file(&dir, HOSTS_JSON)]));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .execute("docker", &format!("echo {i}"), Duration::from_secs(10))
                    .await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.output, format!("{i}\n"));
    }
}
