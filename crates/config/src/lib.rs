//! NetGate configuration structures to map the netgate.toml configuration.

#![deny(missing_docs)]

mod loader;

use std::{borrow::Cow, collections::BTreeSet, net::SocketAddr, path::Path, time::Duration};

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;

/// Main configuration structure for the NetGate application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Model Context Protocol dispatch settings.
    #[serde(default)]
    pub mcp: McpConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the request-gating settings. Invalid gating configuration
    /// must prevent startup rather than run with undefined behavior.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate_gating(self)
    }
}

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
    /// API key authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// API key authentication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether requests must present a valid API key. When disabled,
    /// anonymous requests are admitted but still rate limited per source
    /// address.
    pub enabled: bool,
    /// The set of active API keys. Values are redacted in debug output.
    pub api_keys: Vec<SecretString>,
    /// Request paths that bypass authentication and rate limiting entirely.
    pub exempt_paths: BTreeSet<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_keys: Vec::new(),
            exempt_paths: ["/health", "/metrics"].map(String::from).into(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Maximum number of requests allowed within the interval window.
    pub limit: u32,
    /// Time window over which requests are counted.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            interval: Duration::from_secs(60),
        }
    }
}

/// Health endpoint configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// An optional dedicated socket address for the health endpoint.
    pub listen: Option<SocketAddr>,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            listen: None,
            path: Cow::Borrowed("/health"),
        }
    }
}

/// Model Context Protocol dispatch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McpConfig {
    /// The path under which the tool-dispatch router is mounted.
    pub path: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            path: "/netops-mcp".to_string(),
        }
    }
}
