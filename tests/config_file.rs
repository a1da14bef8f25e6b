use std::io::Write;

use kinetype::config::{ConfigError, ConfigurationError, DeactivationPolicy, load_config};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_hardware_profile_file() {
    let file = write_config(
        r#"
        [scheduler]
        motor_count = 16
        debounce = true
        cooldown_window = 0.2

        [scheduler.deactivation]
        type = "deadline"
        delay = 0.1

        [playback]
        tick_hz = 20.0
        tail = 2.0

        [hardware]
        boards = 4
        base_address = 96
        "#,
    );
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.scheduler.motor_count, 16);
    assert!(config.scheduler.debounce);
    assert_eq!(config.scheduler.deactivation, DeactivationPolicy::Deadline { delay: 0.1 });
    assert_eq!(config.playback.tick_hz, 20.0);
    assert_eq!(config.playback.tail, 2.0);
    assert_eq!(config.hardware.layout().motor_capacity(), 16);
}

#[test]
fn test_load_duration_policy_with_defaults() {
    let file = write_config(
        r#"
        [scheduler.deactivation]
        type = "duration"
        min = 0.05
        max = 0.15
        "#,
    );
    let config = load_config(file.path()).unwrap();
    assert_eq!(
        config.scheduler.deactivation,
        DeactivationPolicy::Duration { min: 0.05, max: 0.15 }
    );
    assert_eq!(config.scheduler.max_pending, 4096);
    assert_eq!(config.playback.tick_hz, 15.0);
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/typewriter.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_toml() {
    let file = write_config("[scheduler\nmotor_count = ");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Toml(_))));
}

#[test]
fn test_invalid_values_are_reported() {
    let file = write_config(
        r#"
        [scheduler]
        motor_count = 40
        "#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid(ConfigurationError::MotorCount { got: 40, max: 32 })
    ));
}

#[test]
fn test_board_address_out_of_range() {
    let file = write_config(
        r#"
        [hardware]
        base_address = 65535
        "#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid(ConfigurationError::BoardAddress {
            boards: 8,
            base_address: 65535,
            max: 0x77,
        })
    ));
}

#[test]
fn test_tick_rate_out_of_range() {
    let file = write_config(
        r#"
        [playback]
        tick_hz = 1e10
        "#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ConfigurationError::TickRate { .. })));
}
