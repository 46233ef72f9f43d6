// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Aigos Project Contributors

//! Trusted signing/verification key material.
//!
//! The verifier's key cache is copy-on-write: a refresh builds a brand new
//! map and atomically swaps it in behind an `RwLock<Arc<..>>`, so lookups
//! never block a concurrent refresh and never observe a half-built map —
//! the same pattern the kernel's kill-switch FSM uses for its instance maps,
//! generalised here to an immutable-snapshot swap instead of a mutex.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

/// Minimum interval between JWKS refreshes, per the verification algorithm's
/// step 2 rate limit.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// One trusted verification key, keyed by `kid` in the cache.
#[derive(Clone)]
pub struct TrustedKey {
    pub kid: String,
    pub algorithm: Algorithm,
    pub decoding_key: DecodingKey,
}

/// Signing key material used by [`crate::generate`]. Distinct from
/// [`TrustedKey`] because a signer never needs the `kid`-indexed lookup
/// structure a verifier does — it signs with exactly one configured key.
pub struct SigningKey {
    pub kid: String,
    pub algorithm: Algorithm,
    pub encoding_key: EncodingKey,
}

/// A source of trusted verification keys a [`TrustedKeyCache`] can refresh
/// from. The in-process variant (static configured keys) never needs a
/// refresh; a JWKS-backed implementation lives behind the
/// `reqwest-middleware` feature.
pub trait KeyStore: Send + Sync {
    /// Fetch the current full set of trusted keys, replacing the cache.
    fn fetch(&self) -> Result<Vec<TrustedKey>, String>;
}

/// Static, never-refreshing key store — the common case for a closed set of
/// peers configured at startup.
pub struct StaticKeyStore {
    keys: Vec<TrustedKey>,
}

impl StaticKeyStore {
    pub fn new(keys: Vec<TrustedKey>) -> Self {
        Self { keys }
    }
}

impl KeyStore for StaticKeyStore {
    fn fetch(&self) -> Result<Vec<TrustedKey>, String> {
        Ok(self.keys.clone())
    }
}

/// JWKS-backed key store: fetches `{"keys": [...]}` from a configured
/// endpoint and converts each entry into a [`TrustedKey`]. Supports the
/// `RSA` and `oct` key types, the two this protocol's issuers actually mint
/// (`RS256`/`RS384`/`RS512` and `HS256`/`HS384`/`HS512`).
///
/// Refresh rate-limiting lives in [`TrustedKeyCache::get_or_refresh`], not
/// here — this type only knows how to do one fetch.
#[cfg(feature = "reqwest-middleware")]
pub struct JwksKeyStore {
    endpoint: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest-middleware")]
impl JwksKeyStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), client: reqwest::blocking::Client::new() }
    }
}

#[cfg(feature = "reqwest-middleware")]
#[derive(serde::Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[cfg(feature = "reqwest-middleware")]
#[derive(serde::Deserialize)]
struct Jwk {
    kty: String,
    kid: String,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
    k: Option<String>,
}

#[cfg(feature = "reqwest-middleware")]
impl KeyStore for JwksKeyStore {
    fn fetch(&self) -> Result<Vec<TrustedKey>, String> {
        let endpoint = self.endpoint.clone();
        let client = self.client.clone();
        // reqwest::blocking drives its own background thread/runtime and
        // isolating the call onto a fresh OS thread avoids the "cannot drop
        // a runtime from an async context" panic on a caller already inside
        // Tokio (the common case — `TrustedKeyCache::get_or_refresh` is
        // invoked synchronously from async middleware). The wait on `.join`
        // still parks the calling thread for the GET's duration, so when
        // that caller is a Tokio worker we run the wait inside
        // `block_in_place` to let the scheduler move other queued tasks off
        // this worker first; outside a runtime (e.g. a sync CLI) `.join` is
        // called directly.
        let do_fetch = move || -> Result<Jwks, String> {
            std::thread::spawn(move || -> Result<Jwks, String> {
                client
                    .get(&endpoint)
                    .send()
                    .map_err(|e| format!("jwks fetch failed: {e}"))?
                    .error_for_status()
                    .map_err(|e| format!("jwks endpoint returned error status: {e}"))?
                    .json()
                    .map_err(|e| format!("jwks response was not valid JSON: {e}"))
            })
            .join()
            .map_err(|_| "jwks fetch thread panicked".to_string())?
        };
        let jwks: Jwks = match tokio::runtime::Handle::try_current() {
            Ok(_) => tokio::task::block_in_place(do_fetch)?,
            Err(_) => do_fetch()?,
        };

        jwks.keys.into_iter().map(jwk_to_trusted_key).collect()
    }
}

#[cfg(feature = "reqwest-middleware")]
fn jwk_to_trusted_key(jwk: Jwk) -> Result<TrustedKey, String> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.ok_or_else(|| format!("jwk {} missing RSA modulus `n`", jwk.kid))?;
            let e = jwk.e.ok_or_else(|| format!("jwk {} missing RSA exponent `e`", jwk.kid))?;
            let algorithm = parse_algorithm(jwk.alg.as_deref().unwrap_or("RS256"), &jwk.kid)?;
            let decoding_key =
                DecodingKey::from_rsa_components(&n, &e).map_err(|err| format!("jwk {} has invalid RSA components: {err}", jwk.kid))?;
            Ok(TrustedKey { kid: jwk.kid, algorithm, decoding_key })
        }
        "oct" => {
            let k = jwk.k.ok_or_else(|| format!("jwk {} missing symmetric key material `k`", jwk.kid))?;
            let algorithm = parse_algorithm(jwk.alg.as_deref().unwrap_or("HS256"), &jwk.kid)?;
            let decoding_key = DecodingKey::from_base64_secret(&k).map_err(|err| format!("jwk {} has invalid secret: {err}", jwk.kid))?;
            Ok(TrustedKey { kid: jwk.kid, algorithm, decoding_key })
        }
        other => Err(format!("jwk {} has unsupported kty {other}", jwk.kid)),
    }
}

pub(crate) fn parse_algorithm(alg: &str, kid: &str) -> Result<Algorithm, String> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(format!("jwk {kid} has unsupported alg {other}")),
    }
}

/// Copy-on-write cache of trusted keys by `kid`, with a rate-limited
/// refresh hook for JWKS-backed key stores.
pub struct TrustedKeyCache {
    keys: RwLock<Arc<HashMap<String, TrustedKey>>>,
    store: Box<dyn KeyStore>,
    last_refresh: RwLock<Option<Instant>>,
}

impl TrustedKeyCache {
    pub fn new(store: Box<dyn KeyStore>) -> Self {
        Self { keys: RwLock::new(Arc::new(HashMap::new())), store, last_refresh: RwLock::new(None) }
    }

    /// Seed the cache immediately (e.g. at startup) regardless of the
    /// refresh rate limit.
    pub fn prime(&self) -> Result<(), String> {
        self.refresh_now()
    }

    /// Look up `kid` in the current snapshot without refreshing.
    pub fn get(&self, kid: &str) -> Option<TrustedKey> {
        self.keys.read().unwrap().get(kid).cloned()
    }

    /// Look up `kid`; on miss, refresh (subject to the rate limit) and
    /// re-look-up once. Returns `None` if still missing after the refresh
    /// attempt — the caller maps that to `KEY_NOT_FOUND`.
    pub fn get_or_refresh(&self, kid: &str) -> Option<TrustedKey> {
        if let Some(key) = self.get(kid) {
            return Some(key);
        }
        if self.try_refresh().is_err() {
            return self.get(kid);
        }
        self.get(kid)
    }

    /// Refresh if at least [`MIN_REFRESH_INTERVAL`] has elapsed since the
    /// last refresh; a no-op (`Ok(())`) otherwise so callers don't need to
    /// special-case the rate limit themselves.
    fn try_refresh(&self) -> Result<(), String> {
        {
            let last = self.last_refresh.read().unwrap();
            if let Some(at) = *last {
                if at.elapsed() < MIN_REFRESH_INTERVAL {
                    return Ok(());
                }
            }
        }
        self.refresh_now()
    }

    fn refresh_now(&self) -> Result<(), String> {
        let fetched = self.store.fetch()?;
        let mut map = HashMap::with_capacity(fetched.len());
        for key in fetched {
            map.insert(key.kid.clone(), key);
        }
        *self.keys.write().unwrap() = Arc::new(map);
        *self.last_refresh.write().unwrap() = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs256_key(kid: &str, secret: &str) -> TrustedKey {
        TrustedKey { kid: kid.into(), algorithm: Algorithm::HS256, decoding_key: DecodingKey::from_secret(secret.as_bytes()) }
    }

    #[test]
    fn primed_cache_finds_known_kid() {
        let store = StaticKeyStore::new(vec![hs256_key("k1", "secret")]);
        let cache = TrustedKeyCache::new(Box::new(store));
        cache.prime().unwrap();
        assert!(cache.get("k1").is_some());
        assert!(cache.get("unknown").is_none());
    }

    #[test]
    fn get_or_refresh_finds_key_after_lazy_refresh() {
        let store = StaticKeyStore::new(vec![hs256_key("k1", "secret")]);
        let cache = TrustedKeyCache::new(Box::new(store));
        assert!(cache.get_or_refresh("k1").is_some());
    }
}
