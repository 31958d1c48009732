//! AtmoInsight backend binary.
//!
//! Wires the shared store pool, the notification relay, the synthetic
//! ingestion timer, and the HTTP API together and runs them until
//! `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `atmo-config.yaml` plus environment
//! 3. Create the shared `PostgreSQL` pool
//! 4. Open the dedicated listener (fatal on failure)
//! 5. Spawn the relay
//! 6. Spawn the ingestion timer, if enabled
//! 7. Serve HTTP until shutdown

mod error;

use std::path::Path;
use std::sync::Arc;

use atmo_api::{AppState, JwtService, ServerConfig};
use atmo_core::{AppConfig, Fanout, IngestionTimer, Relay, relay};
use atmo_db::{PostgresConfig, PostgresPool};
use atmo_types::StoreChannel;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerBinError;

/// Config file looked up relative to the working directory.
const CONFIG_PATH: &str = "atmo-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the store connection, the
/// listener, or the HTTP server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("atmo-server starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        port = config.server.port,
        ingest_enabled = config.ingest.enabled,
        ingest_interval_secs = config.ingest.interval_secs,
        queue_capacity = config.fanout.queue_capacity,
        "Configuration loaded"
    );

    run(config).await?;

    info!("atmo-server shutdown complete");
    Ok(())
}

async fn run(config: AppConfig) -> Result<(), ServerBinError> {
    // 3. Shared pool.
    let pg_config = PostgresConfig::new(&config.database.url)
        .with_max_connections(config.database.max_connections)
        .with_acquire_timeout(config.database.acquire_timeout())
        .with_idle_timeout(config.database.idle_timeout());
    let pool = PostgresPool::connect(&pg_config).await?;

    // 4. Dedicated listener. Without it no derived record reaches a client.
    let mut listener = relay::subscribe(&pg_config, &StoreChannel::ALL).await?;
    info!(
        channels = ?listener.channels(),
        "PostgreSQL listener connected"
    );

    // 5. Relay.
    let fanout = Arc::new(Fanout::new(config.fanout.queue_capacity));
    let forwarder = Arc::new(Relay::new(
        pool.clone(),
        Arc::clone(&fanout),
        config.relay.query_timeout(),
    ));
    let relay_handle = tokio::spawn(async move {
        let stats = forwarder.run(&mut listener).await;
        warn!(
            received = stats.received,
            "Relay exited, no further store events will be pushed"
        );
    });

    // 6. Ingestion timer.
    let ingest_handle = if config.ingest.enabled {
        let timer = IngestionTimer::new(pool.clone(), &config.ingest);
        Some(tokio::spawn(timer.run()))
    } else {
        info!("Synthetic ingestion disabled");
        None
    };

    // 7. HTTP.
    let jwt = JwtService::new(&config.auth.jwt_secret, config.auth.token_ttl());
    let state = Arc::new(
        AppState::new(pool.clone(), fanout, jwt).with_send_timeout(config.fanout.send_timeout()),
    );
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let served = atmo_api::start_server(&server_config, state).await;

    relay_handle.abort();
    if let Some(handle) = ingest_handle {
        handle.abort();
    }
    pool.close().await;

    served?;
    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], falling back to defaults.
///
/// Environment overrides apply either way.
fn load_config() -> Result<AppConfig, ServerBinError> {
    let config_path = Path::new(CONFIG_PATH);
    let config = if config_path.exists() {
        AppConfig::from_file(config_path)?
    } else {
        info!("Config file not found, using defaults");
        AppConfig::parse("")?
    };
    config.validate()?;
    Ok(config)
}
