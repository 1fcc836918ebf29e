//! HTTP surface of the marketplace under `/api/v1`.

mod extract;
mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::error;

use super::accounts::AuthError;
use super::error::DirectoryError;
use super::media::MediaError;
use super::store::RepositoryError;
use super::Marketplace;

pub use extract::{Authenticated, MaybeAuthenticated};

use handlers::*;

/// Router builder exposing every marketplace endpoint.
pub fn marketplace_router(marketplace: Arc<Marketplace>) -> Router {
    let upload_limit = marketplace.media.max_bytes();

    Router::new()
        .route("/api/v1/auth/register", post(register_handler))
        .route("/api/v1/auth/login", post(login_handler))
        .route("/api/v1/auth/logout", post(logout_handler))
        .route("/api/v1/auth/me", get(me_handler))
        .route(
            "/api/v1/companies",
            post(submit_company_handler).get(list_companies_handler),
        )
        .route("/api/v1/companies/stats", get(company_stats_handler))
        .route("/api/v1/companies/export", get(export_companies_handler))
        .route("/api/v1/companies/import", post(import_companies_handler))
        .route(
            "/api/v1/companies/:company_id",
            get(company_profile_handler).delete(delete_company_handler),
        )
        .route(
            "/api/v1/companies/:company_id/transitions",
            post(transition_company_handler),
        )
        .route(
            "/api/v1/companies/:company_id/flags",
            patch(company_flags_handler),
        )
        .route(
            "/api/v1/companies/:company_id/logo",
            put(upload_logo_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/products",
            post(submit_product_handler).get(list_products_handler),
        )
        .route("/api/v1/products/:product_id", get(product_detail_handler))
        .route(
            "/api/v1/products/:product_id/review",
            post(review_product_handler),
        )
        .route(
            "/api/v1/products/:product_id/resubmit",
            post(resubmit_product_handler),
        )
        .route(
            "/api/v1/campaigns",
            post(submit_campaign_handler).get(list_campaigns_handler),
        )
        .route("/api/v1/campaigns/:campaign_id", get(campaign_detail_handler))
        .route(
            "/api/v1/campaigns/:campaign_id/review",
            post(review_campaign_handler),
        )
        .route(
            "/api/v1/campaigns/:campaign_id/resubmit",
            post(resubmit_campaign_handler),
        )
        .route(
            "/api/v1/agents",
            post(register_agent_handler).get(list_agents_handler),
        )
        .route(
            "/api/v1/agents/:agent_id",
            get(agent_summary_handler).patch(agent_status_handler),
        )
        .route(
            "/api/v1/agents/:agent_id/assignments",
            post(assign_companies_handler),
        )
        .route(
            "/api/v1/client-requests",
            post(open_request_handler).get(list_requests_handler),
        )
        .route(
            "/api/v1/client-requests/:request_id/status",
            post(request_status_handler),
        )
        .route(
            "/api/v1/vehicles",
            post(register_vehicle_handler).get(list_vehicles_handler),
        )
        .route(
            "/api/v1/vehicles/:vehicle_id",
            put(update_vehicle_handler).delete(delete_vehicle_handler),
        )
        .route("/api/v1/notifications/devices", post(register_device_handler))
        .route("/api/v1/media/*key", get(media_handler))
        .with_state(marketplace)
}

impl DirectoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DirectoryError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DirectoryError::Transition(_)
            | DirectoryError::Duplicate(_)
            | DirectoryError::InvalidState(_) => StatusCode::CONFLICT,
            DirectoryError::Repository(RepositoryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            DirectoryError::Repository(
                RepositoryError::Conflict { .. } | RepositoryError::VersionMismatch { .. },
            ) => StatusCode::CONFLICT,
            DirectoryError::Auth(AuthError::InvalidCredentials | AuthError::Unauthenticated) => {
                StatusCode::UNAUTHORIZED
            }
            DirectoryError::Auth(AuthError::Forbidden(_) | AuthError::Disabled(_)) => {
                StatusCode::FORBIDDEN
            }
            DirectoryError::Media(MediaError::UnsupportedType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            DirectoryError::Media(MediaError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            DirectoryError::Media(MediaError::Empty) => StatusCode::UNPROCESSABLE_ENTITY,
            DirectoryError::Repository(RepositoryError::Unavailable(_))
            | DirectoryError::Media(MediaError::Backend(_))
            | DirectoryError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let payload = match &self {
            DirectoryError::Validation(validation) => json!({
                "error": self.to_string(),
                "fields": validation.fields,
            }),
            other => json!({
                "error": other.to_string(),
            }),
        };
        (status, Json(payload)).into_response()
    }
}
