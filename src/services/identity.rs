// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID-token verification for command ingress.
//!
//! Client tokens are RS256 JWTs issued by `securetoken.google.com` and
//! verified against Google's published JWKS, cached in memory with the
//! advertised Cache-Control TTL. A static HS256 mode exists for
//! deterministic local/integration tests.

use crate::config::Config;
use anyhow::Context;
use dashmap::DashMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Verified end-user identity extracted from a valid ID token.
#[derive(Debug, Clone)]
pub struct VerifiedUser {
    pub uid: String,
}

/// Verification error categories.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// The token is missing/invalid or claims do not match expectations.
    Forbidden(String),
    /// A transient infrastructure failure occurred (JWKS fetch).
    Transient(String),
}

enum VerifierMode {
    Firebase,
    StaticHs256 { decoding_key: Box<DecodingKey> },
}

/// Verifier for Firebase-issued end-user ID tokens.
pub struct IdentityVerifier {
    http_client: reqwest::Client,
    firebase_project_id: String,
    mode: VerifierMode,
    keys_by_kid: DashMap<String, Arc<DecodingKey>>,
    keys_expire_at: Mutex<Instant>,
}

impl IdentityVerifier {
    /// Create a verifier from config. When `auth_test_hs256_key` is set
    /// (tests only), RS256 verification is replaced by the static key.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building identity HTTP client")?;

        let mode = match &config.auth_test_hs256_key {
            Some(key) => {
                tracing::warn!("Identity verifier using static HS256 test key");
                VerifierMode::StaticHs256 {
                    decoding_key: Box::new(DecodingKey::from_secret(key)),
                }
            }
            None => VerifierMode::Firebase,
        };

        Ok(Self {
            http_client,
            firebase_project_id: config.firebase_project_id.clone(),
            mode,
            keys_by_kid: DashMap::new(),
            keys_expire_at: Mutex::new(Instant::now()),
        })
    }

    fn expected_issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.firebase_project_id)
    }

    /// Verify a bearer ID token and return the authenticated uid.
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedUser, AuthError> {
        let mut validation = match &self.mode {
            VerifierMode::StaticHs256 { .. } => Validation::new(Algorithm::HS256),
            VerifierMode::Firebase => Validation::new(Algorithm::RS256),
        };
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer()]);
        validation.set_audience(&[self.firebase_project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = match &self.mode {
            VerifierMode::StaticHs256 { decoding_key } => {
                decode::<IdTokenClaims>(token, decoding_key, &validation)
                    .map_err(|e| AuthError::Forbidden(format!("JWT validation failed: {e}")))?
            }
            VerifierMode::Firebase => {
                let header = decode_header(token)
                    .map_err(|e| AuthError::Forbidden(format!("invalid JWT header: {e}")))?;
                if header.alg != Algorithm::RS256 {
                    return Err(AuthError::Forbidden(format!(
                        "unexpected JWT alg: {:?}",
                        header.alg
                    )));
                }
                let kid = header
                    .kid
                    .ok_or_else(|| AuthError::Forbidden("missing JWT kid".to_string()))?;
                let decoding_key = self.decoding_key_for_kid(&kid).await?;

                decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
                    .map_err(|e| AuthError::Forbidden(format!("JWT validation failed: {e}")))?
            }
        };

        let uid = token_data.claims.sub;
        if uid.trim().is_empty() {
            return Err(AuthError::Forbidden("empty sub claim".to_string()));
        }

        Ok(VerifiedUser { uid })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AuthError::Forbidden(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let expires_at = *self.keys_expire_at.lock().await;
        if expires_at <= Instant::now() {
            return None;
        }
        self.keys_by_kid.get(kid).map(|entry| entry.value().clone())
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AuthError> {
        // The expiry mutex doubles as the refresh lock so concurrent misses
        // trigger one fetch.
        let mut expires_at = self.keys_expire_at.lock().await;

        if !force_refresh && *expires_at > Instant::now() {
            return Ok(());
        }

        tracing::debug!("Refreshing securetoken JWKS cache");

        let response = self
            .http_client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| AuthError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AuthError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut usable = 0usize;
        self.keys_by_kid.clear();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }
            if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    self.keys_by_kid.insert(jwk.kid, Arc::new(key));
                    usable += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if usable == 0 {
            return Err(AuthError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *expires_at = Instant::now() + ttl;
        tracing::debug!(ttl_secs = ttl.as_secs(), usable, "securetoken JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

/// Mint a short-lived HS256 test token accepted by the static-key mode.
///
/// Only meaningful with `Config::auth_test_hs256_key` set; used by
/// integration tests to act as an authenticated app client.
pub fn create_test_id_token(
    uid: &str,
    firebase_project_id: &str,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(serde::Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        iss: String,
        aud: &'a str,
        iat: usize,
        exp: usize,
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;
    let claims = TestClaims {
        sub: uid,
        iss: format!("https://securetoken.google.com/{firebase_project_id}"),
        aud: firebase_project_id,
        iat: now,
        exp: now + 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
