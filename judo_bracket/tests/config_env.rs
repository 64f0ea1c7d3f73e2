//! Integration tests for environment-based configuration
//!
//! Environment variables are process-wide, so every test runs serially.

use judo_bracket::{ConfigError, EngineConfig};
use serial_test::serial;

const VARS: [&str; 4] = [
    "JUDO_MAX_PLAYERS",
    "JUDO_REPECHAGE_THRESHOLD",
    "JUDO_MAX_BYE_SWAPS",
    "JUDO_STORE_ROOT",
];

fn clear_env() {
    for var in VARS {
        // SAFETY: tests touching the environment are serialized
        unsafe { std::env::remove_var(var) };
    }
}

fn set_env(var: &str, value: &str) {
    // SAFETY: tests touching the environment are serialized
    unsafe { std::env::set_var(var, value) };
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = EngineConfig::from_env().unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    set_env("JUDO_MAX_PLAYERS", "32");
    set_env("JUDO_REPECHAGE_THRESHOLD", " 8 ");
    set_env("JUDO_MAX_BYE_SWAPS", "250");
    set_env("JUDO_STORE_ROOT", "events/paris-2026");

    let config = EngineConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.max_players, 32);
    assert_eq!(config.repechage_threshold, 8);
    assert_eq!(config.max_bye_swaps, 250);
    assert_eq!(config.store_root, "events/paris-2026");
}

#[test]
#[serial]
fn test_from_env_rejects_malformed_values() {
    clear_env();
    set_env("JUDO_MAX_PLAYERS", "many");
    let result = EngineConfig::from_env();
    clear_env();

    assert_eq!(
        result,
        Err(ConfigError::InvalidValue {
            var: "JUDO_MAX_PLAYERS".to_string(),
            value: "many".to_string(),
        })
    );
}

#[test]
#[serial]
fn test_from_env_validates_ranges() {
    clear_env();
    set_env("JUDO_MAX_PLAYERS", "128");
    let result = EngineConfig::from_env();
    clear_env();

    assert!(matches!(
        result,
        Err(ConfigError::OutOfRange {
            field: "max_players",
            ..
        })
    ));
}
