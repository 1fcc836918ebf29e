use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use directorio::config::AdminBootstrap;
use directorio::error::AppError;
use directorio::marketplace::Marketplace;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Create the configured administrator account, if any. Existing admins are left untouched.
pub(crate) fn bootstrap_admin(
    marketplace: &Marketplace,
    admin: Option<&AdminBootstrap>,
) -> Result<(), AppError> {
    let Some(admin) = admin else {
        warn!("no bootstrap administrator configured; staff accounts cannot be provisioned");
        return Ok(());
    };
    let account = marketplace
        .accounts
        .bootstrap_admin(&admin.email, &admin.password)?;
    info!(user_id = %account.id, email = %account.email, "administrator available");
    Ok(())
}
