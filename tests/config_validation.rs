//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use multiboot_protocol::config::{LinkKind, LoggingConfig, MultibootConfig, PollConfig};
use multiboot_protocol::error::ProtocolError;
use serial_test::serial;
use std::time::Duration;
use tracing::Level;

const ENV_VARS: [&str; 6] = [
    "MULTIBOOT_LINK_KIND",
    "MULTIBOOT_LINK_PATH",
    "MULTIBOOT_POLL_INTERVAL_MS",
    "MULTIBOOT_POLL_TIMEOUT_MS",
    "MULTIBOOT_POLL_MAX_ATTEMPTS",
    "MULTIBOOT_LOG_LEVEL",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn test_default_config_validates() {
    let config = MultibootConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_default_poll_policy() {
    let policy = MultibootConfig::default().poll.policy();
    assert_eq!(policy.interval, Duration::from_millis(10));
    assert_eq!(policy.timeout, Some(Duration::from_secs(30)));
    assert_eq!(policy.max_attempts, None);
}

#[test]
fn test_empty_device_path() {
    let mut config = MultibootConfig::default();
    config.link.path = String::new();

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_emulated_link_ignores_path() {
    let config = MultibootConfig::default_with_overrides(|c| {
        c.link.kind = LinkKind::Emulated;
        c.link.path = String::new();
    });
    assert!(config.validate().is_empty());
}

#[test]
fn test_short_poll_interval() {
    let mut config = MultibootConfig::default();
    config.poll.interval = Duration::from_micros(100);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Poll interval too short")));
}

#[test]
fn test_long_poll_interval() {
    let mut config = MultibootConfig::default();
    config.poll.interval = Duration::from_secs(11);
    config.poll.timeout = Duration::from_secs(60);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Poll interval too long")));
}

#[test]
fn test_timeout_shorter_than_interval() {
    let mut config = MultibootConfig::default();
    config.poll.interval = Duration::from_millis(500);
    config.poll.timeout = Duration::from_millis(100);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("shorter than the poll interval")));
}

#[test]
fn test_unbounded_polling_warning() {
    let poll = PollConfig {
        timeout: Duration::ZERO,
        max_attempts: 0,
        ..PollConfig::default()
    };

    let errors = poll.validate();
    assert!(errors.iter().any(|e| e.starts_with("WARNING")));

    let policy = poll.policy();
    assert_eq!(policy.timeout, None);
    assert_eq!(policy.max_attempts, None);
}

#[test]
fn test_attempt_limit_without_deadline() {
    let poll = PollConfig {
        timeout: Duration::ZERO,
        max_attempts: 500,
        ..PollConfig::default()
    };
    assert!(poll.validate().is_empty());
    assert_eq!(poll.policy().max_attempts, Some(500));
}

#[test]
fn test_empty_app_name() {
    let mut config = MultibootConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = MultibootConfig::default();
    config.logging.app_name = "a".repeat(65);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = MultibootConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = MultibootConfig::default();
    config.link.path = String::new();
    config.logging.app_name = String::new();

    let result = config.validate_strict();
    match result {
        Err(ProtocolError::ConfigError(msg)) => {
            assert!(msg.contains("Configuration validation failed"));
            assert!(msg.contains("Link path"));
            assert!(msg.contains("Application name"));
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_toml_round_trip_and_partial_sections() {
    let config = MultibootConfig::from_toml(
        r#"
        [link]
        kind = "socket"
        path = "/tmp/bridge.sock"

        [poll]
        interval = 5
        timeout = 2000
        "#,
    )
    .expect("valid TOML");

    assert_eq!(config.link.kind, LinkKind::Socket);
    assert_eq!(config.link.path, "/tmp/bridge.sock");
    assert_eq!(config.poll.interval, Duration::from_millis(5));
    assert_eq!(config.poll.timeout, Duration::from_secs(2));
    assert_eq!(config.poll.max_attempts, 0);
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_unknown_link_kind_in_toml() {
    let result = MultibootConfig::from_toml(
        r#"
        [link]
        kind = "carrier-pigeon"
        path = "/dev/null"
        "#,
    );
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_example_config_parses() {
    let example = MultibootConfig::example_config();
    let parsed = MultibootConfig::from_toml(&example).expect("example config must parse");
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("multiboot.toml");

    let config = MultibootConfig::default_with_overrides(|c| {
        c.link.kind = LinkKind::Emulated;
        c.poll.max_attempts = 42;
        c.logging = LoggingConfig {
            log_level: Level::DEBUG,
            log_exchanges: true,
            ..LoggingConfig::default()
        };
    });
    config.save_to_file(&path).unwrap();

    let loaded = MultibootConfig::from_file(&path).unwrap();
    assert_eq!(loaded.link.kind, LinkKind::Emulated);
    assert_eq!(loaded.poll.max_attempts, 42);
    assert_eq!(loaded.logging.log_level, Level::DEBUG);
    assert!(loaded.logging.log_exchanges);
}

#[test]
fn test_missing_config_file() {
    let result = MultibootConfig::from_file("/nonexistent/multiboot.toml");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("MULTIBOOT_LINK_KIND", "Emulated");
    std::env::set_var("MULTIBOOT_POLL_INTERVAL_MS", "25");
    std::env::set_var("MULTIBOOT_POLL_TIMEOUT_MS", "0");
    std::env::set_var("MULTIBOOT_POLL_MAX_ATTEMPTS", "9");
    std::env::set_var("MULTIBOOT_LOG_LEVEL", "warn");

    let config = MultibootConfig::from_env().expect("env config");
    clear_env();

    assert_eq!(config.link.kind, LinkKind::Emulated);
    assert_eq!(config.poll.interval, Duration::from_millis(25));
    assert_eq!(config.poll.timeout, Duration::ZERO);
    assert_eq!(config.poll.max_attempts, 9);
    assert_eq!(config.logging.log_level, Level::WARN);
}

#[test]
#[serial]
fn test_env_rejects_unknown_link_kind() {
    clear_env();
    std::env::set_var("MULTIBOOT_LINK_KIND", "parallel");
    let result = MultibootConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
#[serial]
fn test_env_ignores_malformed_numbers() {
    clear_env();
    std::env::set_var("MULTIBOOT_POLL_INTERVAL_MS", "soon");
    let config = MultibootConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.poll.interval, Duration::from_millis(10));
}
