// Unit tests for configuration loading, defaults, and validation.

use polyglot_gateway::config::{Config, WorkerMode};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn load(contents: &str) -> anyhow::Result<Config> {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    Config::from_file(file.path().to_str().unwrap())
}

#[test]
fn test_empty_file_yields_defaults() {
    let config = load("").unwrap();

    assert_eq!(config.log_level, "info");
    assert_eq!(config.limits.max_message_length, 2000);
    assert_eq!(config.presence.activity_throttle, Duration::from_secs(5));
    assert_eq!(config.presence.connection_throttle, Duration::from_secs(60));
    assert_eq!(config.language_cache.ttl, Duration::from_secs(600));
    assert_eq!(config.language_cache.max_entries, 1000);
    assert_eq!(config.worker.mode, WorkerMode::Tcp);
    assert_eq!(config.worker.request_addr, "127.0.0.1:5555");
    assert_eq!(config.worker.events_addr, "127.0.0.1:5558");
    assert_eq!(config.worker.task_timeout, Duration::from_secs(30));
    assert_eq!(config.worker.direct_timeout, Duration::from_secs(5));
    assert_eq!(config.worker.max_translation_length, 10_000);
    assert!(!config.metrics.enabled);
    assert_eq!(config.metrics.port, 9600);
}

#[test]
fn test_partial_file_overrides_only_named_fields() {
    let config = load(
        r#"
log_level = "debug"

[presence]
activity_throttle = "2s"

[worker]
mode = "echo"
direct_timeout = "750ms"

[metrics]
enabled = true
port = 9700
"#,
    )
    .unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.presence.activity_throttle, Duration::from_secs(2));
    // Untouched fields keep their defaults.
    assert_eq!(config.presence.connection_throttle, Duration::from_secs(60));
    assert_eq!(config.worker.mode, WorkerMode::Echo);
    assert_eq!(config.worker.direct_timeout, Duration::from_millis(750));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9700);
}

#[test]
fn test_connection_throttle_must_exceed_activity_throttle() {
    let result = load(
        r#"
[presence]
activity_throttle = "60s"
connection_throttle = "5s"
"#,
    );
    let err = result.unwrap_err().to_string();
    assert!(err.contains("connection_throttle"));
}

#[test]
fn test_equal_throttles_are_rejected() {
    assert!(load(
        r#"
[presence]
activity_throttle = "10s"
connection_throttle = "10s"
"#,
    )
    .is_err());
}

#[test]
fn test_zero_limits_are_rejected() {
    assert!(load("[limits]\nmax_message_length = 0\n").is_err());
    assert!(load("[language_cache]\nmax_entries = 0\n").is_err());
    assert!(load("[worker]\ndirect_timeout = \"0s\"\n").is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::from_file("/nonexistent/config.toml").is_err());
}

#[test]
fn test_malformed_toml_is_an_error() {
    assert!(load("this is not toml [").is_err());
}
