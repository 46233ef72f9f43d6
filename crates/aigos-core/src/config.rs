// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Configuration loader for the kernel's core-owned subsystems (the policy
//! engine, the kill-switch replay guard).
//!
//! Supports the same two load strategies the rest of the pack uses:
//!
//! 1. **TOML file** — [`load_kernel_config`] reads and deserialises a TOML
//!    file into a [`KernelFileConfig`].
//! 2. **Environment variables** — [`load_kernel_config_from_env`] reads
//!    `AIGOS_`-prefixed environment variables.
//!
//! Both loaders are only available when the `config-loader` feature is
//! active (implies `std`). Token generator/validator configuration lives in
//! the `aigos-a2a` crate, which has its own loader following the identical
//! pattern — this module only covers the subsystems `aigos-core` itself
//! owns.
//!
//! # File format
//!
//! ```toml
//! [policy]
//! dry_run         = false
//! fail_open       = false
//! default_allow   = false
//! max_cache_size  = 1000
//!
//! [replay]
//! max_command_age_s = 300
//! max_nonce_cache    = 10000
//! ```
//!
//! # Environment variables
//!
//! | Variable                       | Type    | Default |
//! |---------------------------------|---------|---------|
//! | `AIGOS_POLICY_DRY_RUN`          | bool    | false   |
//! | `AIGOS_POLICY_FAIL_OPEN`        | bool    | false   |
//! | `AIGOS_POLICY_DEFAULT_ALLOW`    | bool    | false   |
//! | `AIGOS_POLICY_MAX_CACHE_SIZE`   | integer | 1000    |
//! | `AIGOS_REPLAY_MAX_COMMAND_AGE_S`| integer | 300     |
//! | `AIGOS_REPLAY_MAX_NONCE_CACHE`  | integer | 10000   |

#![cfg(feature = "config-loader")]

use std::fs;
use std::num::{ParseIntError, TryFromIntError};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::killswitch::ReplayConfig;
use crate::policy::PolicyConfig;

/// Serialisation-friendly mirror of [`PolicyConfig`]. Kept distinct from the
/// engine-internal struct the same way the pack separates a flat, loadable
/// config shape from the type the hot path actually consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFileConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub fail_open: bool,
    #[serde(default)]
    pub default_allow: bool,
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
}

fn default_max_cache_size() -> usize {
    1000
}

impl Default for PolicyFileConfig {
    fn default() -> Self {
        Self { dry_run: false, fail_open: false, default_allow: false, max_cache_size: default_max_cache_size() }
    }
}

impl From<PolicyFileConfig> for PolicyConfig {
    fn from(file: PolicyFileConfig) -> Self {
        PolicyConfig {
            dry_run: file.dry_run,
            fail_open: file.fail_open,
            default_allow: file.default_allow,
            max_cache_size: file.max_cache_size,
        }
    }
}

/// Serialisation-friendly mirror of [`ReplayConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFileConfig {
    #[serde(default = "default_max_command_age_s")]
    pub max_command_age_s: u64,
    #[serde(default = "default_max_nonce_cache")]
    pub max_nonce_cache: usize,
}

fn default_max_command_age_s() -> u64 {
    300
}

fn default_max_nonce_cache() -> usize {
    10_000
}

impl Default for ReplayFileConfig {
    fn default() -> Self {
        Self { max_command_age_s: default_max_command_age_s(), max_nonce_cache: default_max_nonce_cache() }
    }
}

impl From<ReplayFileConfig> for ReplayConfig {
    fn from(file: ReplayFileConfig) -> Self {
        ReplayConfig { max_command_age_s: file.max_command_age_s, max_nonce_cache: file.max_nonce_cache }
    }
}

/// Top-level loadable configuration for the core-owned subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelFileConfig {
    #[serde(default)]
    pub policy: PolicyFileConfig,
    #[serde(default)]
    pub replay: ReplayFileConfig,
}

/// Load a [`KernelFileConfig`] from a TOML file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or the TOML content
/// does not match the expected schema.
pub fn load_kernel_config(path: &str) -> Result<KernelFileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead { path: path.to_owned(), source })?;
    toml::from_str::<KernelFileConfig>(&content).map_err(|source| ConfigError::TomlParse { source })
}

/// Load a [`KernelFileConfig`] from `AIGOS_`-prefixed environment variables.
/// Unset variables fall back to their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::ParseField`] if a variable is set to a value that
/// cannot be parsed, or [`ConfigError::InvalidRange`] for out-of-range
/// integers.
pub fn load_kernel_config_from_env() -> Result<KernelFileConfig, ConfigError> {
    let policy = PolicyFileConfig {
        dry_run: read_env_bool("AIGOS_POLICY_DRY_RUN", false)?,
        fail_open: read_env_bool("AIGOS_POLICY_FAIL_OPEN", false)?,
        default_allow: read_env_bool("AIGOS_POLICY_DEFAULT_ALLOW", false)?,
        max_cache_size: read_env_usize("AIGOS_POLICY_MAX_CACHE_SIZE", default_max_cache_size())?,
    };

    let max_command_age_s = read_env_u64("AIGOS_REPLAY_MAX_COMMAND_AGE_S", default_max_command_age_s())?;
    let max_nonce_cache = read_env_usize("AIGOS_REPLAY_MAX_NONCE_CACHE", default_max_nonce_cache())?;
    if max_command_age_s == 0 {
        return Err(ConfigError::InvalidRange {
            field: "AIGOS_REPLAY_MAX_COMMAND_AGE_S".into(),
            value: max_command_age_s.to_string(),
            reason: "must be > 0".into(),
        });
    }

    Ok(KernelFileConfig { policy, replay: ReplayFileConfig { max_command_age_s, max_nonce_cache } })
}

fn read_env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::ParseField {
                field: key.to_owned(),
                value: other.to_owned(),
                reason: "expected one of: true/false, 1/0, yes/no, on/off".into(),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn read_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().map_err(|source: ParseIntError| ConfigError::ParseField {
            field: key.to_owned(),
            value: val,
            reason: source.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn read_env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(val) => {
            let parsed = val.trim().parse::<u64>().map_err(|source: ParseIntError| ConfigError::ParseField {
                field: key.to_owned(),
                value: val.clone(),
                reason: source.to_string(),
            })?;
            usize::try_from(parsed).map_err(|source: TryFromIntError| ConfigError::ParseField {
                field: key.to_owned(),
                value: val,
                reason: source.to_string(),
            })
        }
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_into_policy_config() {
        let file = PolicyFileConfig::default();
        let config: PolicyConfig = file.into();
        assert!(!config.dry_run);
        assert_eq!(config.max_cache_size, 1000);
    }

    #[test]
    fn env_loader_honors_overrides() {
        std::env::set_var("AIGOS_POLICY_DRY_RUN", "true");
        std::env::set_var("AIGOS_REPLAY_MAX_COMMAND_AGE_S", "60");
        let config = load_kernel_config_from_env().unwrap();
        assert!(config.policy.dry_run);
        assert_eq!(config.replay.max_command_age_s, 60);
        std::env::remove_var("AIGOS_POLICY_DRY_RUN");
        std::env::remove_var("AIGOS_REPLAY_MAX_COMMAND_AGE_S");
    }

    #[test]
    fn rejects_zero_command_age() {
        std::env::set_var("AIGOS_REPLAY_MAX_COMMAND_AGE_S", "0");
        let result = load_kernel_config_from_env();
        assert!(matches!(result, Err(ConfigError::InvalidRange { .. })));
        std::env::remove_var("AIGOS_REPLAY_MAX_COMMAND_AGE_S");
    }
}
