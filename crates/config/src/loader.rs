use std::path::Path;

use anyhow::bail;

use crate::Config;

pub(crate) fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    validate_gating(&config)?;

    log::debug!(
        "Loaded configuration from {} ({} API keys, rate limit {}/{:?})",
        path.display(),
        config.server.auth.api_keys.len(),
        config.server.rate_limits.limit,
        config.server.rate_limits.interval,
    );

    Ok(config)
}

pub(crate) fn validate_gating(config: &Config) -> anyhow::Result<()> {
    if config.server.rate_limits.enabled && config.server.rate_limits.interval.is_zero() {
        bail!("rate limit interval must be greater than zero");
    }

    if config.server.auth.enabled && config.server.auth.api_keys.is_empty() {
        bail!(
            "authentication is enabled but no API keys are configured. \
            Add keys to [server.auth] api_keys or disable authentication"
        );
    }

    // The router rejects paths without a leading slash; catch them here so
    // a bad path is a configuration error instead of a startup abort.
    if !config.mcp.path.starts_with('/') {
        bail!("MCP path must start with '/'");
    }

    if config.server.health.enabled && !config.server.health.path.starts_with('/') {
        bail!("health path must start with '/'");
    }

    Ok(())
}
