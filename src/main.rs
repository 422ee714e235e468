use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ualflix_admin::config::Config;
use ualflix_admin::db::StoreManager;
use ualflix_admin::services::{
    AggregationService, HealthProber, HostSampler, LagProbeSettings, MetricsStore, MonitorContext,
    ReplicaInspector, RollingHistory, ServiceDirectory, Supervisor,
};
use ualflix_admin::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load()?;
    tracing::info!("Configuration loaded successfully");

    let store = StoreManager::connect(&config.store).await?;
    let inspector = ReplicaInspector::new(store, LagProbeSettings::from(&config.replication));

    let directory = ServiceDirectory::from_config(&config.services);
    tracing::info!(services = directory.len(), "Service directory loaded");

    let ctx = MonitorContext {
        directory,
        prober: HealthProber::new(&config.probe, config.broker.clone())?,
        inspector: inspector.clone(),
        metrics: Arc::new(MetricsStore::new()?),
        history: Arc::new(RollingHistory::new(config.collector.history_capacity)),
        host: Arc::new(HostSampler::new()),
    };

    let supervisor = Arc::new(Supervisor::start(ctx.clone(), &config.collector));

    let state = AppState {
        aggregation: AggregationService::new(ctx.clone()),
        inspector,
        metrics: ctx.metrics.clone(),
        supervisor: supervisor.clone(),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown().await;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ualflix_admin=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
