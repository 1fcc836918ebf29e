use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    CONTENT_DISPOSITION, CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::extract::{Authenticated, MaybeAuthenticated};
use crate::marketplace::accounts::{AccountRegistration, Credentials};
use crate::marketplace::agents::{AgentId, AgentRegistration, AgentStatusUpdate, AssignmentRequest};
use crate::marketplace::catalog::{
    CampaignFilter, CampaignId, CampaignSubmission, ProductFilter, ProductId, ProductSubmission,
    ReviewRequest,
};
use crate::marketplace::clients::{
    ClientRequestId, ClientRequestSubmission, RequestStatusUpdate, VehicleId, VehicleSubmission,
};
use crate::marketplace::companies::{
    CompanyFilter, CompanyId, CompanySubmission, FlagUpdate, LegacyCompanyRecord,
    TransitionRequest,
};
use crate::marketplace::error::DirectoryError;
use crate::marketplace::media::ImageUpload;
use crate::marketplace::notifications::DeviceRequest;
use crate::marketplace::store::RepositoryError;
use crate::marketplace::Marketplace;

type Shared = State<Arc<Marketplace>>;
type Outcome = Result<Response, DirectoryError>;

fn ok<T: serde::Serialize>(body: T) -> Outcome {
    Ok((StatusCode::OK, Json(body)).into_response())
}

fn created<T: serde::Serialize>(body: T) -> Outcome {
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

fn no_content() -> Outcome {
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(super) async fn register_handler(
    State(marketplace): Shared,
    Json(registration): Json<AccountRegistration>,
) -> Outcome {
    created(marketplace.accounts.register(registration)?)
}

pub(super) async fn login_handler(
    State(marketplace): Shared,
    Json(credentials): Json<Credentials>,
) -> Outcome {
    ok(marketplace.accounts.login(&credentials)?)
}

pub(super) async fn logout_handler(State(marketplace): Shared, auth: Authenticated) -> Outcome {
    marketplace.accounts.logout(&auth.token)?;
    no_content()
}

pub(super) async fn me_handler(State(marketplace): Shared, auth: Authenticated) -> Outcome {
    ok(marketplace.accounts.account(&auth.actor.user_id)?)
}

pub(super) async fn submit_company_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(submission): Json<CompanySubmission>,
) -> Outcome {
    created(marketplace.companies.submit(&auth.actor, submission)?)
}

pub(super) async fn list_companies_handler(
    State(marketplace): Shared,
    viewer: MaybeAuthenticated,
    Query(filter): Query<CompanyFilter>,
) -> Outcome {
    ok(marketplace.companies.list(viewer.actor(), &filter)?)
}

pub(super) async fn company_stats_handler(
    State(marketplace): Shared,
    auth: Authenticated,
) -> Outcome {
    ok(marketplace.companies.stats(&auth.actor)?)
}

pub(super) async fn export_companies_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Query(filter): Query<CompanyFilter>,
) -> Outcome {
    let csv = marketplace.companies.export_csv(&auth.actor, &filter)?;
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"empresas.csv\""),
        ],
        csv,
    )
        .into_response())
}

pub(super) async fn import_companies_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(records): Json<Vec<LegacyCompanyRecord>>,
) -> Outcome {
    ok(marketplace.companies.import_legacy(&auth.actor, records)?)
}

pub(super) async fn company_profile_handler(
    State(marketplace): Shared,
    viewer: MaybeAuthenticated,
    Path(company_id): Path<String>,
) -> Outcome {
    let id = CompanyId(company_id);
    ok(marketplace.companies.profile(viewer.actor(), &id)?)
}

pub(super) async fn delete_company_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(company_id): Path<String>,
) -> Outcome {
    marketplace
        .companies
        .delete(&auth.actor, &CompanyId(company_id))?;
    no_content()
}

pub(super) async fn transition_company_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(company_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Outcome {
    let id = CompanyId(company_id);
    ok(marketplace.companies.transition(&auth.actor, &id, request)?)
}

pub(super) async fn company_flags_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(company_id): Path<String>,
    Json(update): Json<FlagUpdate>,
) -> Outcome {
    let id = CompanyId(company_id);
    ok(marketplace.companies.set_flags(&auth.actor, &id, update)?)
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UploadParams {
    #[serde(default)]
    file_name: Option<String>,
}

/// Raw image body; the type comes from `Content-Type` or the `file_name` query parameter.
pub(super) async fn upload_logo_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(company_id): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Outcome {
    let upload = ImageUpload {
        file_name: params.file_name,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        bytes: body.to_vec(),
    };
    let id = CompanyId(company_id);
    ok(marketplace.companies.upload_logo(&auth.actor, &id, upload)?)
}

pub(super) async fn submit_product_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(submission): Json<ProductSubmission>,
) -> Outcome {
    created(marketplace.catalog.submit_product(&auth.actor, submission)?)
}

pub(super) async fn list_products_handler(
    State(marketplace): Shared,
    viewer: MaybeAuthenticated,
    Query(filter): Query<ProductFilter>,
) -> Outcome {
    ok(marketplace.catalog.list_products(viewer.actor(), &filter)?)
}

pub(super) async fn product_detail_handler(
    State(marketplace): Shared,
    viewer: MaybeAuthenticated,
    Path(product_id): Path<String>,
) -> Outcome {
    let id = ProductId(product_id);
    ok(marketplace.catalog.product_detail(viewer.actor(), &id)?)
}

pub(super) async fn review_product_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(product_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Outcome {
    let id = ProductId(product_id);
    ok(marketplace.catalog.review_product(&auth.actor, &id, request)?)
}

pub(super) async fn resubmit_product_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(product_id): Path<String>,
) -> Outcome {
    let id = ProductId(product_id);
    ok(marketplace.catalog.resubmit_product(&auth.actor, &id)?)
}

pub(super) async fn submit_campaign_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(submission): Json<CampaignSubmission>,
) -> Outcome {
    created(marketplace.catalog.submit_campaign(&auth.actor, submission)?)
}

pub(super) async fn list_campaigns_handler(
    State(marketplace): Shared,
    viewer: MaybeAuthenticated,
    Query(filter): Query<CampaignFilter>,
) -> Outcome {
    ok(marketplace.catalog.list_campaigns(viewer.actor(), &filter)?)
}

pub(super) async fn campaign_detail_handler(
    State(marketplace): Shared,
    viewer: MaybeAuthenticated,
    Path(campaign_id): Path<String>,
) -> Outcome {
    let id = CampaignId(campaign_id);
    ok(marketplace.catalog.campaign_detail(viewer.actor(), &id)?)
}

pub(super) async fn review_campaign_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(campaign_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Outcome {
    let id = CampaignId(campaign_id);
    ok(marketplace.catalog.review_campaign(&auth.actor, &id, request)?)
}

pub(super) async fn resubmit_campaign_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(campaign_id): Path<String>,
) -> Outcome {
    let id = CampaignId(campaign_id);
    ok(marketplace.catalog.resubmit_campaign(&auth.actor, &id)?)
}

pub(super) async fn register_agent_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(registration): Json<AgentRegistration>,
) -> Outcome {
    created(marketplace.agents.register_agent(&auth.actor, registration)?)
}

pub(super) async fn list_agents_handler(State(marketplace): Shared, auth: Authenticated) -> Outcome {
    ok(marketplace.agents.list_agents(&auth.actor)?)
}

pub(super) async fn agent_summary_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(agent_id): Path<String>,
) -> Outcome {
    let id = AgentId(agent_id);
    ok(marketplace.agents.agent_summary(&auth.actor, &id)?)
}

pub(super) async fn agent_status_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(agent_id): Path<String>,
    Json(update): Json<AgentStatusUpdate>,
) -> Outcome {
    let id = AgentId(agent_id);
    ok(marketplace.agents.set_agent_active(&auth.actor, &id, update)?)
}

pub(super) async fn assign_companies_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(agent_id): Path<String>,
    Json(request): Json<AssignmentRequest>,
) -> Outcome {
    let id = AgentId(agent_id);
    ok(marketplace.agents.assign_companies(&auth.actor, &id, request)?)
}

pub(super) async fn open_request_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(submission): Json<ClientRequestSubmission>,
) -> Outcome {
    created(marketplace.clients.open_request(&auth.actor, submission)?)
}

pub(super) async fn list_requests_handler(
    State(marketplace): Shared,
    auth: Authenticated,
) -> Outcome {
    ok(marketplace.clients.list_requests(&auth.actor)?)
}

pub(super) async fn request_status_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(request_id): Path<String>,
    Json(update): Json<RequestStatusUpdate>,
) -> Outcome {
    let id = ClientRequestId(request_id);
    ok(marketplace
        .clients
        .update_request_status(&auth.actor, &id, update)?)
}

pub(super) async fn register_vehicle_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(submission): Json<VehicleSubmission>,
) -> Outcome {
    created(marketplace.clients.register_vehicle(&auth.actor, submission)?)
}

pub(super) async fn list_vehicles_handler(
    State(marketplace): Shared,
    auth: Authenticated,
) -> Outcome {
    ok(marketplace.clients.list_vehicles(&auth.actor)?)
}

pub(super) async fn update_vehicle_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(vehicle_id): Path<String>,
    Json(submission): Json<VehicleSubmission>,
) -> Outcome {
    let id = VehicleId(vehicle_id);
    ok(marketplace
        .clients
        .update_vehicle(&auth.actor, &id, submission)?)
}

pub(super) async fn delete_vehicle_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Path(vehicle_id): Path<String>,
) -> Outcome {
    marketplace
        .clients
        .delete_vehicle(&auth.actor, &VehicleId(vehicle_id))?;
    no_content()
}

pub(super) async fn register_device_handler(
    State(marketplace): Shared,
    auth: Authenticated,
    Json(request): Json<DeviceRequest>,
) -> Outcome {
    created(marketplace.notifications.register_device(&auth.actor, request)?)
}

pub(super) async fn media_handler(State(marketplace): Shared, Path(key): Path<String>) -> Outcome {
    let key = key.trim_start_matches('/');
    let media = marketplace
        .media
        .fetch(key)?
        .ok_or_else(|| RepositoryError::NotFound {
            collection: "media",
            id: key.to_string(),
        })?;
    // Uploaded SVG may carry script; a sandboxed document cannot run it on this origin.
    Ok((
        [
            (CONTENT_TYPE, media.content_type),
            (CONTENT_SECURITY_POLICY, "sandbox".to_string()),
            (X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        media.bytes,
    )
        .into_response())
}
