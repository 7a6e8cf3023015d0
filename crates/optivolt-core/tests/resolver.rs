use std::path::{Path, PathBuf};

use optivolt_core::*;
use tempfile::TempDir;

const HOSTS_JSON: &str = r#"{
    "environments": {
        "docker": {
            "hostname": "localhost",
            "ip": "127.0.0.1",
            "port": 22,
            "user": "root",
            "workdir": "/tmp"
        },
        "microvm": {
            "hostname": "test-microvm",
            "address": "192.168.1.100",
            "port": 2222,
            "username": "testuser",
            "privateKeyPath": "~/.ssh/id_ed25519",
            "workingDirectory": "/opt/tests"
        }
    }
}"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn found(resolution: Resolution) -> HostConfig {
    match resolution {
        Resolution::Found(config) => config,
        Resolution::NotFound { available } => panic!("expected Found, available: {available:?}"),
    }
}

#[test]
fn test_resolve_parses_valid_configuration() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", HOSTS_JSON);
    let resolver = EnvironmentResolver::new([path]);

    let config = found(resolver.resolve("microvm").unwrap());

    assert_eq!(config.hostname, "test-microvm");
    assert_eq!(config.address, "192.168.1.100");
    assert_eq!(config.port, 2222);
    assert_eq!(config.username, "testuser");
    assert_eq!(config.credential_ref, "~/.ssh/id_ed25519");
    assert_eq!(config.working_directory, "/opt/tests");
    assert!(!config.is_local());
}

#[test]
fn test_unknown_environment_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", HOSTS_JSON);
    let resolver = EnvironmentResolver::new([path]);

    for name in ["nonexistent", "unikernel", "DOCKER", ""] {
        let resolution = resolver.resolve(name).unwrap();
        assert_eq!(
            resolution,
            Resolution::NotFound {
                available: vec!["docker".to_string(), "microvm".to_string()],
            },
            "name: {name:?}"
        );
    }
}

#[test]
fn test_not_found_converts_to_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", HOSTS_JSON);
    let resolver = EnvironmentResolver::new([path]);

    let err = resolver
        .resolve("unikernel")
        .unwrap()
        .into_found("unikernel")
        .unwrap_err();

    assert!(matches!(
        err,
        ConfigError::EnvironmentNotFound { ref name, .. } if name == "unikernel"
    ));
}

#[test]
fn test_missing_source_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nonexistent_config.json");
    let resolver = EnvironmentResolver::new([missing.clone()]);

    let err = resolver.resolve("docker").unwrap_err();

    assert_eq!(err, ConfigError::SourceMissing { searched: vec![missing] });
}

#[test]
fn test_empty_candidate_list_is_missing_source() {
    let resolver = EnvironmentResolver::new(Vec::<PathBuf>::new());
    assert!(matches!(
        resolver.resolve("docker"),
        Err(ConfigError::SourceMissing { .. })
    ));
}

#[test]
fn test_malformed_json_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", "{ invalid json }");
    let resolver = EnvironmentResolver::new([&path]);

    let err = resolver.resolve("docker").unwrap_err();

    assert!(matches!(err, ConfigError::Malformed { path: ref p, .. } if p == &path));
}

#[test]
fn test_document_without_environments_is_malformed() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", r#"{ "scripts": {} }"#);
    let resolver = EnvironmentResolver::new([path]);

    assert!(matches!(
        resolver.resolve("docker"),
        Err(ConfigError::Malformed { .. })
    ));
}

#[test]
fn test_first_existing_candidate_wins() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let first = write(
        &dir,
        "first.json",
        r#"{ "hosts": { "docker": { "hostname": "first", "user": "a" } } }"#,
    );
    let second = write(
        &dir,
        "second.json",
        r#"{ "hosts": { "docker": { "hostname": "second", "user": "b" } } }"#,
    );
    let resolver = EnvironmentResolver::new([missing, first.clone(), second]);

    assert_eq!(resolver.source().unwrap(), first.as_path());
    assert_eq!(found(resolver.resolve("docker").unwrap()).hostname, "first");
}

#[test]
fn test_toml_source() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "hosts.toml",
        r#"
[environments.unikernel]
hostname = "10.0.0.9"
username = "current"
workingDirectory = "/srv/bench"
"#,
    );
    let resolver = EnvironmentResolver::new([path]);

    let config = found(resolver.resolve("unikernel").unwrap());

    assert_eq!(config.port, DEFAULT_PORT);
    assert!(config.uses_current_user());
    assert_eq!(config.working_directory, "/srv/bench");
}

#[test]
fn test_resolution_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", HOSTS_JSON);
    let resolver = EnvironmentResolver::new([path]);

    let first = resolver.resolve("docker").unwrap();
    let second = resolver.resolve("docker").unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_environments_lists_names() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "hosts.json", HOSTS_JSON);
    let resolver = EnvironmentResolver::new([path.as_path()]);

    assert_eq!(resolver.environments().unwrap(), vec!["docker", "microvm"]);
    assert_eq!(resolver.candidates(), &[path.to_path_buf()]);
}

#[test]
fn test_default_locations_are_ordered() {
    let resolver = EnvironmentResolver::from_default_locations();
    let candidates = resolver.candidates();

    let local = candidates
        .iter()
        .position(|p| p == Path::new("config/hosts.json"))
        .unwrap();
    let bare = candidates
        .iter()
        .position(|p| p == Path::new("hosts.json"))
        .unwrap();
    assert!(local < bare);
}
