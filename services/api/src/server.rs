use crate::cli::ServeArgs;
use crate::infra::{bootstrap_admin, AppState};
use crate::routes::with_service_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use directorio::config::AppConfig;
use directorio::error::AppError;
use directorio::marketplace::{Marketplace, MarketplaceSettings};
use directorio::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let config = with_overrides(AppConfig::load()?, args);
    telemetry::init(&config.telemetry, config.environment)?;

    // Notices stay in the in-process log; no push transport is wired into this binary.
    let (marketplace, _notices) =
        Marketplace::in_memory(MarketplaceSettings::from(&config.directory));
    bootstrap_admin(&marketplace, config.directory.admin.as_ref())?;

    let ready = Arc::new(AtomicBool::new(false));
    let app = assemble(marketplace, ready.clone());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    ready.store(true, Ordering::Release);
    info!(?config.environment, %addr, "directory service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn with_overrides(mut config: AppConfig, args: ServeArgs) -> AppConfig {
    let ServeArgs { host, port } = args;
    config.server.host = host.unwrap_or(config.server.host);
    config.server.port = port.unwrap_or(config.server.port);
    config
}

fn assemble(marketplace: Marketplace, ready: Arc<AtomicBool>) -> Router {
    let (metrics_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let state = AppState {
        readiness: ready,
        metrics: Arc::new(metrics_handle),
    };

    with_service_routes(Arc::new(marketplace))
        .layer(Extension(state))
        .layer(metrics_layer)
}
