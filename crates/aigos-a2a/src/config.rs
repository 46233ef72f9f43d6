// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! TOML file and `AIGOS_A2A_`-prefixed environment variable loading for the
//! token generator and validator, mirroring `aigos-core::config`'s loader
//! pattern exactly.

#![cfg(feature = "config-loader")]

use std::fs;

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};

use crate::error::A2AConfigError;
use crate::generate::{GenerateOptions, DEFAULT_TTL_SECS};
use crate::keys::{parse_algorithm, KeyStore, StaticKeyStore, TrustedKey};
use crate::verify::VerifyOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGeneratorFileConfig {
    pub issuer: String,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default = "default_ttl")]
    pub default_ttl_s: u64,
}

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

impl From<TokenGeneratorFileConfig> for GenerateOptions {
    fn from(file: TokenGeneratorFileConfig) -> Self {
        GenerateOptions { audience: file.audience, ttl_secs: file.default_ttl_s, issuer: file.issuer }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenValidatorFileConfig {
    pub required_issuer: String,
    #[serde(default)]
    pub required_audiences: Vec<String>,
    #[serde(default = "default_skew")]
    pub max_clock_skew_s: u64,
    #[serde(default = "default_true")]
    pub validate_control: bool,
    #[serde(default = "default_true")]
    pub reject_paused: bool,
    #[serde(default = "default_true")]
    pub reject_termination_pending: bool,
    /// Inline trusted keys. Ignored once `jwks_endpoint` is set.
    #[serde(default)]
    pub trusted_keys: Vec<TrustedKeyFileConfig>,
    /// JWKS endpoint to refresh trusted keys from. Takes priority over
    /// `trusted_keys` when both are present.
    #[serde(default)]
    pub jwks_endpoint: Option<String>,
}

/// One inline trusted key in `trusted_keys`. Exactly one of `secret_base64`
/// (for `HS*` algorithms) or `public_key_pem` (for `RS*` algorithms) must be
/// set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedKeyFileConfig {
    pub kid: String,
    pub algorithm: String,
    #[serde(default)]
    pub secret_base64: Option<String>,
    #[serde(default)]
    pub public_key_pem: Option<String>,
}

impl TrustedKeyFileConfig {
    fn into_trusted_key(self) -> Result<TrustedKey, A2AConfigError> {
        let algorithm = parse_algorithm(&self.algorithm, &self.kid)
            .map_err(|reason| A2AConfigError::ParseField { field: "trusted_keys.algorithm".into(), value: self.kid.clone(), reason })?;
        let decoding_key = if let Some(secret) = &self.secret_base64 {
            DecodingKey::from_base64_secret(secret).map_err(|err| A2AConfigError::ParseField {
                field: "trusted_keys.secret_base64".into(),
                value: self.kid.clone(),
                reason: err.to_string(),
            })?
        } else if let Some(pem) = &self.public_key_pem {
            DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|err| A2AConfigError::ParseField {
                field: "trusted_keys.public_key_pem".into(),
                value: self.kid.clone(),
                reason: err.to_string(),
            })?
        } else {
            return Err(A2AConfigError::ParseField {
                field: "trusted_keys".into(),
                value: self.kid.clone(),
                reason: "neither secret_base64 nor public_key_pem set".into(),
            });
        };
        Ok(TrustedKey { kid: self.kid.clone(), algorithm, decoding_key })
    }
}

/// Builds the key store a validator config section describes: a JWKS-backed
/// store when `jwks_endpoint` is configured (step 2 of the verification
/// algorithm, rate-limited by [`crate::keys::TrustedKeyCache`] once wrapped),
/// inline [`StaticKeyStore`] keys otherwise.
pub fn build_key_store(file: &TokenValidatorFileConfig) -> Result<Box<dyn KeyStore>, A2AConfigError> {
    if let Some(endpoint) = &file.jwks_endpoint {
        #[cfg(feature = "reqwest-middleware")]
        {
            return Ok(Box::new(crate::keys::JwksKeyStore::new(endpoint.clone())));
        }
        #[cfg(not(feature = "reqwest-middleware"))]
        {
            return Err(A2AConfigError::ParseField {
                field: "jwks_endpoint".into(),
                value: endpoint.clone(),
                reason: "jwks_endpoint is configured but the reqwest-middleware feature is not enabled".into(),
            });
        }
    }
    let keys = file.trusted_keys.iter().cloned().map(TrustedKeyFileConfig::into_trusted_key).collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(StaticKeyStore::new(keys)))
}

fn default_skew() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl From<TokenValidatorFileConfig> for VerifyOptions {
    fn from(file: TokenValidatorFileConfig) -> Self {
        VerifyOptions {
            required_issuer: file.required_issuer,
            required_audiences: file.required_audiences,
            max_clock_skew_secs: file.max_clock_skew_s,
            validate_control: file.validate_control,
            reject_paused: file.reject_paused,
            reject_terminated: file.reject_termination_pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2AFileConfig {
    pub generator: TokenGeneratorFileConfig,
    pub validator: TokenValidatorFileConfig,
}

pub fn load_a2a_config(path: &str) -> Result<A2AFileConfig, A2AConfigError> {
    let content = fs::read_to_string(path).map_err(|source| A2AConfigError::FileRead { path: path.to_owned(), source })?;
    toml::from_str::<A2AFileConfig>(&content).map_err(|source| A2AConfigError::TomlParse { source })
}
