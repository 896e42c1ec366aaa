//! Authorization outcomes consumed by the HTTP layer.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use rate_limit::QuotaStatus;

use crate::keystore;

/// The rate-limiting bucket key for a request's originator.
///
/// Two requests presenting the same credential map to the same identity
/// and therefore share a quota. Anonymous traffic is bucketed per source
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Identity for an authenticated client, derived from the digest
    /// prefix of the credential so the key itself never leaves the gate.
    pub fn from_credential(credential: &str) -> Self {
        Self(format!("key:{}", keystore::digest_prefix(credential)))
    }

    /// Identity for an anonymous client, bucketed by source address.
    pub fn from_ip(ip: IpAddr) -> Self {
        Self(format!("ip:{ip}"))
    }

    /// Shared identity for traffic with no credential and no derivable
    /// source address, and for exempt-path requests.
    pub fn anonymous() -> Self {
        Self("anonymous".to_string())
    }

    /// The bucket key used by the rate limiter.
    pub fn bucket(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The gate's decision for one inbound request.
///
/// Every request maps to exactly one verdict; no expected condition is an
/// error path. The HTTP layer owns the mapping to status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The request may proceed as the given identity.
    Allow {
        /// The identity the request proceeds as.
        identity: ClientIdentity,
        /// The identity's quota standing, when the limiter was consulted.
        quota: Option<QuotaStatus>,
    },
    /// No credential was presented and authentication is required.
    Unauthenticated,
    /// A credential was presented but is not in the active key set.
    Forbidden,
    /// The credential was accepted but the identity's quota is exhausted.
    RateLimited {
        /// Time until the identity's window resets, when known.
        retry_after: Option<Duration>,
        /// The exhausted quota standing, when known.
        quota: Option<QuotaStatus>,
    },
}
