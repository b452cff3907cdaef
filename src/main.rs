use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tracing::info;

use scantrace_api as api;

use api::services::assembly_scan::AssemblyScanService;
use api::services::config_registry::ConfigRegistry;
use api::store::{HttpRemoteStore, LocalStore, PersistenceGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Audit event channel
    let (event_sender, event_rx) = api::events::channel(cfg.event_channel_capacity);
    tokio::spawn(api::events::process_events(event_rx));

    // Persistence: durable remote store + resilient local cache
    let remote = HttpRemoteStore::new(
        cfg.remote_store.base_url.clone(),
        Duration::from_secs(cfg.remote_store.request_timeout_secs),
        Duration::from_millis(cfg.remote_store.probe_timeout_millis),
    )
    .context("failed to build remote store client")?;
    let gateway = Arc::new(PersistenceGateway::new(
        Arc::new(LocalStore::new()),
        Arc::new(remote),
        event_sender.clone(),
    ));

    let registry = Arc::new(ConfigRegistry::with_builtin_catalog());
    let scan_service = Arc::new(AssemblyScanService::new(
        registry,
        gateway.clone(),
        event_sender,
    ));

    let state = api::AppState {
        scan_service,
        gateway,
    };

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    info!(%addr, environment = %cfg.environment, "scantrace-api listening");

    axum::serve(listener, api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {}", err);
        return;
    }
    info!("shutdown signal received");
}
