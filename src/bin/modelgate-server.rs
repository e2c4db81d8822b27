//! HTTP server for the gateway.
//!
//! Environment:
//! - `MODELGATE_CONFIG`: path to the JSON configuration (required)
//! - `MODELGATE_ADDR`: listen address (default `0.0.0.0:8080`)
//! - `MODELGATE_LOG_LEVEL` / `MODELGATE_LOG_FORMAT` / `MODELGATE_LOG_FILE`: see `telemetry`

use std::sync::Arc;

use modelgate::cache::MemoryCacheStore;
use modelgate::config::GatewayConfig;
use modelgate::gateway::Gateway;
use modelgate::server_adapters::axum::{RouterOptions, router};
use modelgate::telemetry;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = telemetry::init_from_env()?;

    let path = std::env::var("MODELGATE_CONFIG")
        .map_err(|_| "MODELGATE_CONFIG must point at a JSON configuration file")?;
    let config = GatewayConfig::from_file(&path)?.resolve_env();
    let cache = Arc::new(MemoryCacheStore::new(config.idempotency.cache_capacity));
    let gateway = Gateway::from_config_with_cache(config, cache)?;

    let addr = std::env::var("MODELGATE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, models = gateway.list_models().len(), "modelgate listening");

    axum::serve(listener, router(Arc::new(gateway), RouterOptions::production())).await?;
    Ok(())
}
