//! Request gating for NetGate.
//!
//! This crate combines API-key authentication with per-identity rate
//! limiting into a single authorization verdict per inbound request:
//! the [`AuthGate`] extracts a credential, validates it against the
//! [`KeyStore`], derives the client identity, and consults the rate
//! limiter before letting the request through.

#![deny(missing_docs)]

mod keystore;
mod verdict;

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use http::HeaderMap;
use http::header::AUTHORIZATION;
use rate_limit::{RateLimitError, RateLimitManager};
use secrecy::ExposeSecret as _;

pub use keystore::{KeyStore, generate_api_key, hash_api_key};
pub use verdict::{ClientIdentity, Verdict};

/// Alternative credential headers, checked after `Authorization` in this
/// order. The first non-empty value wins.
const API_KEY_HEADERS: [&str; 2] = ["x-api-key", "api-key"];

/// Orchestrates authentication and rate limiting into one verdict per
/// inbound request.
pub struct AuthGate {
    require_auth: bool,
    exempt_paths: BTreeSet<String>,
    keystore: Arc<KeyStore>,
    limiter: Arc<RateLimitManager>,
}

impl AuthGate {
    /// Build a gate from the authentication configuration, loading the
    /// configured API keys into a fresh key store.
    pub fn new(config: &config::AuthConfig, limiter: Arc<RateLimitManager>) -> Self {
        let keystore = Arc::new(KeyStore::new());
        keystore.load(config.api_keys.iter().map(|key| key.expose_secret()));

        log::debug!(
            "Auth gate initialized: require_auth={}, {} keys, exempt paths {:?}",
            config.enabled,
            config.api_keys.len(),
            config.exempt_paths,
        );

        Self {
            require_auth: config.enabled,
            exempt_paths: config.exempt_paths.clone(),
            keystore,
            limiter,
        }
    }

    /// The gate's key store, for hot-reloading the active key set.
    pub fn keystore(&self) -> &Arc<KeyStore> {
        &self.keystore
    }

    /// Produce the authorization verdict for one inbound request.
    ///
    /// `client_ip` is the connection-level fallback identity used for
    /// anonymous traffic when authentication is disabled.
    pub async fn authorize(&self, path: &str, headers: &HeaderMap, client_ip: Option<IpAddr>) -> Verdict {
        if self.exempt_paths.contains(path) {
            log::debug!("Path {path} is exempt from authentication and rate limiting");
            return Verdict::Allow {
                identity: ClientIdentity::anonymous(),
                quota: None,
            };
        }

        match extract_credential(headers) {
            None if self.require_auth => {
                log::debug!("No API key provided for {path}");
                Verdict::Unauthenticated
            }
            None => {
                let identity = client_ip.map_or_else(ClientIdentity::anonymous, ClientIdentity::from_ip);
                self.check_limit(identity).await
            }
            Some(credential) => {
                if !self.keystore.is_valid(credential) {
                    log::warn!("Invalid API key attempt for {path}");
                    return Verdict::Forbidden;
                }

                self.check_limit(ClientIdentity::from_credential(credential)).await
            }
        }
    }

    async fn check_limit(&self, identity: ClientIdentity) -> Verdict {
        match self.limiter.check(identity.bucket()).await {
            Ok(quota) => Verdict::Allow { identity, quota },
            Err(RateLimitError::LimitExceeded { retry_after, quota }) => {
                log::debug!("Rate limit exceeded for {identity}");
                Verdict::RateLimited {
                    retry_after,
                    quota: Some(quota),
                }
            }
            // Backend failures fail closed: an unverifiable quota is
            // treated as exhausted rather than waved through.
            Err(err) => {
                log::error!("Rate limiter failure for {identity}: {err}");
                Verdict::RateLimited {
                    retry_after: None,
                    quota: None,
                }
            }
        }
    }
}

/// Extract the presented credential: `Authorization: Bearer <token>`
/// first, then `X-API-Key`, then `API-Key`. The first non-empty match
/// wins.
fn extract_credential(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.is_empty()
    {
        return Some(token);
    }

    for name in API_KEY_HEADERS {
        if let Some(value) = headers.get(name).and_then(|value| value.to_str().ok())
            && !value.is_empty()
        {
            return Some(value);
        }
    }

    None
}
