//! roomcastd - room-based real-time messaging relay daemon.

use roomcast::auth::HttpSessionVerifier;
use roomcast::config::Config;
use roomcast::db::Database;
use roomcast::network::Gateway;
use roomcast::state::Relay;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(server = %config.server.name, "Starting roomcastd");

    let db_path = config
        .database
        .as_ref()
        .map(|d| d.path.as_str())
        .unwrap_or("roomcast.db");
    let db = Database::new(db_path).await?;

    let verifier = Arc::new(HttpSessionVerifier::new(
        config.auth.endpoint.clone(),
        config.auth.project_id.clone(),
    ));

    let relay = Arc::new(Relay::new(db, verifier, config.limits.clone()));

    if let Some(http_addr) = config.listen.http_address {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            roomcast::http::run(http_addr, relay).await;
        });
        info!(addr = %http_addr, "HTTP API started");
    } else {
        info!("HTTP API disabled");
    }

    let gateway = Gateway::bind(
        config.listen.address,
        config.listen.allow_origins.clone(),
        Arc::clone(&relay),
    )
    .await?;

    gateway.run().await?;

    Ok(())
}
