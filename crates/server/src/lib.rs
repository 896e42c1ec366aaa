//! NetGate server library.
//!
//! Provides a reusable server function to serve the gateway either for the binary, or for tests.

#![deny(missing_docs)]

mod dispatch;
mod gating;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Router,
    routing::{any, get},
};
use config::Config;
use gate::AuthGate;
use rate_limit::RateLimitManager;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

pub use gating::GateLayer;

/// Configuration for serving NetGate.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized NetGate TOML configuration.
    pub config: Config,
    /// The downstream tool-dispatch router, mounted under the configured
    /// MCP path. When absent the dispatch path answers 503.
    pub dispatch: Option<Router>,
}

/// Starts and runs the NetGate server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        dispatch,
    }: ServeConfig,
) -> anyhow::Result<()> {
    config.validate()?;

    if config.server.health.enabled
        && let Some(listen) = config.server.health.listen
    {
        tokio::spawn(health::bind_health_endpoint(listen, config.server.health.clone()));
    }

    let app = build_router(&config, dispatch)?;

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!("MCP endpoint available at: http://{listen_address}{}", config.mcp.path);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}

/// Assemble the application router: the dispatch path, the co-hosted
/// health endpoint, and the gate in front of everything. Exempt paths
/// pass the gate untouched, so the health endpoint stays reachable.
fn build_router(config: &Config, dispatch: Option<Router>) -> anyhow::Result<Router> {
    let limiter = Arc::new(RateLimitManager::new(config.server.rate_limits.clone())?);
    let gate = Arc::new(AuthGate::new(&config.server.auth, limiter));

    let mut app = match dispatch {
        Some(router) => Router::new().nest(&config.mcp.path, router),
        None => {
            log::warn!(
                "Server starting with no downstream tool router. \
                The dispatch path will answer 503 until one is mounted through ServeConfig."
            );

            Router::new().route(&config.mcp.path, any(dispatch::unavailable))
        }
    };

    if config.server.health.enabled && config.server.health.listen.is_none() {
        app = app.route(&config.server.health.path, get(health::health));
    }

    Ok(app.layer(GateLayer::new(gate)).layer(CorsLayer::permissive()))
}
