use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::api::outcome_json;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{resolve_viewing_request, ApplicationStatus};
use crate::middleware::{is_landlord, AppState, AuthUser};
use crate::models::{
    Application, ApplicationResponse, ApplicationsQuery, CreateApplicationRequest, Lease,
    Property, RejectApplicationRequest, ScheduleViewingRequest, ViewingRequest,
};
use crate::services::application_service::SubmitApplication;
use crate::services::{Approval, ApplicationService, EmailService};
use crate::store::{PgStore, RentalStore};
use crate::utils::validators::page_bounds;

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ApprovalResponse {
    pub application: Application,
    pub lease: Lease,
    pub property: Property,
    pub rejected_application_ids: Vec<Uuid>,
}

impl From<Approval> for ApprovalResponse {
    fn from(a: Approval) -> Self {
        Self {
            application: a.application,
            lease: a.lease,
            property: a.property,
            rejected_application_ids: a.rejected_application_ids,
        }
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ScheduledViewingResponse {
    pub application: Application,
    pub viewing_request: ViewingRequest,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications).post(submit_application))
        .route("/:id", get(get_application))
        .route("/:id/schedule-viewing", post(schedule_viewing))
        .route("/:id/approve", post(approve_application))
        .route("/:id/reject", post(reject_application))
}

/// Applications the caller made (tenant) or received (landlord)
#[utoipa::path(
    get,
    path = "/api/v1/applications",
    tag = "applications",
    security(("bearer_auth" = [])),
    params(ApplicationsQuery),
    responses(
        (status = 200, description = "Applications", body = Vec<ApplicationResponse>),
        (status = 422, description = "Unknown status filter")
    )
)]
pub async fn list_applications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ApplicationsQuery>,
) -> AppResult<Json<Vec<ApplicationResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            ApplicationStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("Unknown application status '{}'", s)))
        })
        .transpose()?;
    let (limit, offset) = page_bounds(query.page, query.limit);

    let rows = sqlx::query_as::<_, Application>(
        r#"
        SELECT a.* FROM applications a
        JOIN properties p ON p.id = a.property_id
        WHERE (CASE WHEN $1 THEN p.landlord_id = $2 ELSE a.tenant_id = $2 END)
          AND ($3::application_status IS NULL OR a.status = $3)
          AND ($4::uuid IS NULL OR a.property_id = $4)
        ORDER BY a.created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(is_landlord(&auth_user.role))
    .bind(auth_user.user_id)
    .bind(status)
    .bind(query.property_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let store = PgStore::new(state.pool.clone());
    let mut response = Vec::with_capacity(rows.len());
    for application in rows {
        response.push(build_response(&store, application).await?);
    }

    Ok(Json(response))
}

async fn build_response(store: &PgStore, application: Application) -> AppResult<ApplicationResponse> {
    let property = store
        .get_property(application.property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;
    let tenant_name = store
        .get_profile(application.tenant_id)
        .await?
        .map(|p| p.display_name())
        .unwrap_or_default();
    let viewings = store
        .list_viewings_for_pair(application.property_id, application.tenant_id)
        .await?;
    let viewing_request =
        resolve_viewing_request(&viewings, application.property_id, application.tenant_id)
            .cloned();

    Ok(ApplicationResponse {
        application,
        property_title: property.title,
        tenant_name,
        viewing_request,
    })
}

/// Apply for a property
#[utoipa::path(
    post,
    path = "/api/v1/applications",
    tag = "applications",
    security(("bearer_auth" = [])),
    request_body = CreateApplicationRequest,
    responses(
        (status = 200, description = "Application submitted", body = Application),
        (status = 403, description = "Only tenants apply"),
        (status = 409, description = "Already applied, or property unavailable")
    )
)]
pub async fn submit_application(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateApplicationRequest>,
) -> AppResult<Json<Value>> {
    auth_user.require_tenant()?;
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ApplicationService::new(&store, &mailer)
        .submit(
            auth_user.user_id,
            SubmitApplication {
                property_id: payload.property_id,
                proposed_move_in_date: payload.proposed_move_in_date,
                lease_duration_requested: payload.lease_duration_requested,
                additional_occupants: payload.additional_occupants,
                additional_occupants_details: payload.additional_occupants_details,
                tenant_notes: payload.tenant_notes,
            },
        )
        .await?;

    Ok(Json(outcome_json(outcome)))
}

/// Application with the viewing request it refers to
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}",
    tag = "applications",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application", body = ApplicationResponse),
        (status = 403, description = "Neither applicant nor landlord"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_application(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApplicationResponse>> {
    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let detail = ApplicationService::new(&store, &mailer)
        .detail(auth_user.user_id, id)
        .await?;

    let tenant_name = store
        .get_profile(detail.application.tenant_id)
        .await?
        .map(|p| p.display_name())
        .unwrap_or_default();

    Ok(Json(ApplicationResponse {
        application: detail.application,
        property_title: detail.property.title,
        tenant_name,
        viewing_request: detail.viewing_request,
    }))
}

/// Landlord proposes a viewing to the applicant
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/schedule-viewing",
    tag = "applications",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = ScheduleViewingRequest,
    responses(
        (status = 200, description = "Viewing proposed", body = ScheduledViewingResponse),
        (status = 403, description = "Not the landlord"),
        (status = 409, description = "Application is past this stage")
    )
)]
pub async fn schedule_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleViewingRequest>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ApplicationService::new(&store, &mailer)
        .schedule_viewing(
            auth_user.user_id,
            id,
            payload.requested_date,
            payload.requested_time.as_deref(),
            payload.message,
        )
        .await?;

    Ok(Json(outcome_json(outcome.map(|(application, viewing_request)| {
        ScheduledViewingResponse {
            application,
            viewing_request,
        }
    }))))
}

/// Approve an application. Creates the lease, marks the property occupied and turns down
/// the other applicants. Calling it again after a failure resumes where it stopped.
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/approve",
    tag = "applications",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Approved; `degraded` lists failed notifications", body = ApprovalResponse),
        (status = 403, description = "Not the landlord"),
        (status = 409, description = "Already decided, or property no longer available")
    )
)]
pub async fn approve_application(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ApplicationService::new(&store, &mailer)
        .approve(auth_user.user_id, id)
        .await?;

    Ok(Json(outcome_json(outcome.map(ApprovalResponse::from))))
}

/// Turn an application down
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/reject",
    tag = "applications",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = RejectApplicationRequest,
    responses(
        (status = 200, description = "Rejected", body = Application),
        (status = 403, description = "Not the landlord"),
        (status = 409, description = "Already decided")
    )
)]
pub async fn reject_application(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectApplicationRequest>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ApplicationService::new(&store, &mailer)
        .reject(auth_user.user_id, id, payload.reason)
        .await?;

    Ok(Json(outcome_json(outcome)))
}
