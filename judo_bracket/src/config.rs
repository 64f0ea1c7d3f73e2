//! Engine configuration.
//!
//! Defaults follow IJF rules; every value can be overridden through the
//! environment for installations that run smaller club events.

use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};
use thiserror::Error;

/// Largest category the seeding tables cover
pub const MAX_SUPPORTED_PLAYERS: usize = 64;

/// Minimum number of competitors for a repechage under IJF rules
pub const DEFAULT_REPECHAGE_THRESHOLD: usize = 6;

/// Lower bound on double-BYE repair attempts
pub const MIN_BYE_SWAPS: usize = 100;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    InvalidValue { var: String, value: String },

    #[error("{field} = {value} is out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Bracket engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest accepted category (at most 64)
    pub max_players: usize,

    /// Categories with at least this many competitors hold a repechage
    pub repechage_threshold: usize,

    /// Attempts allowed to separate two BYEs drawn into one pairing
    pub max_bye_swaps: usize,

    /// Prefix of every document path written by the service
    pub store_root: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_players: MAX_SUPPORTED_PLAYERS,
            repechage_threshold: DEFAULT_REPECHAGE_THRESHOLD,
            max_bye_swaps: MIN_BYE_SWAPS,
            store_root: "tournament".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - `JUDO_MAX_PLAYERS`: largest category (default: 64)
    /// - `JUDO_REPECHAGE_THRESHOLD`: repechage threshold (default: 6)
    /// - `JUDO_MAX_BYE_SWAPS`: double-BYE repair attempts (default: 100)
    /// - `JUDO_STORE_ROOT`: document path prefix (default: `tournament`)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable does not parse or the resulting
    /// configuration fails [`EngineConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_players: env_or("JUDO_MAX_PLAYERS", defaults.max_players)?,
            repechage_threshold: env_or("JUDO_REPECHAGE_THRESHOLD", defaults.repechage_threshold)?,
            max_bye_swaps: env_or("JUDO_MAX_BYE_SWAPS", defaults.max_bye_swaps)?,
            store_root: env::var("JUDO_STORE_ROOT").unwrap_or(defaults.store_root),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 || self.max_players > MAX_SUPPORTED_PLAYERS {
            return Err(ConfigError::OutOfRange {
                field: "max_players",
                value: self.max_players.to_string(),
                reason: "must be between 1 and 64",
            });
        }

        // Smaller categories have no quarterfinals to feed a repechage
        if self.repechage_threshold < 5 {
            return Err(ConfigError::OutOfRange {
                field: "repechage_threshold",
                value: self.repechage_threshold.to_string(),
                reason: "must be at least 5",
            });
        }

        if self.max_bye_swaps < MIN_BYE_SWAPS {
            return Err(ConfigError::OutOfRange {
                field: "max_bye_swaps",
                value: self.max_bye_swaps.to_string(),
                reason: "must be at least 100",
            });
        }

        if self.store_root.is_empty() || self.store_root.ends_with('/') {
            return Err(ConfigError::OutOfRange {
                field: "store_root",
                value: self.store_root.clone(),
                reason: "must be non-empty without a trailing slash",
            });
        }

        Ok(())
    }
}

fn env_or<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
