//! VCS Facade server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use facade_index::{HostnameLeadership, IndexStore};
use facade_server::{AppState, Settings, create_router, metrics::init_metrics, run_server};
use facade_vcs::BackendRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid server address")?;

    tracing::info!("Starting VCS Facade v{}", env!("CARGO_PKG_VERSION"));

    let prometheus = init_metrics().context("failed to install metrics recorder")?;

    let registry = BackendRegistry::from_configs(&settings.backends)
        .context("invalid backend configuration")?;
    for backend in registry.iter() {
        tracing::info!(backend = ?backend, "Backend registered");
    }

    let leadership = HostnameLeadership::new(
        settings.scheduler.master_hostname.clone(),
        settings.local_hostname(),
    );
    let state = AppState::new(
        &settings,
        Arc::new(registry),
        IndexStore::in_memory(),
        Arc::new(leadership),
    );

    let scheduler = state
        .scheduler
        .start(settings.scan.submit_delay, &settings.scan.rescan_cron)
        .await
        .context("failed to start sync scheduler")?;

    let result = run_server(addr, create_router(state, prometheus)).await;
    scheduler.shutdown().await;
    result?;

    Ok(())
}
