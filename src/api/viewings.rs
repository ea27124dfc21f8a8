use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{is_landlord, AppState, AuthUser};
use crate::models::{
    CreateViewingRequest, LandlordViewingActionRequest, TenantDeclineViewingRequest,
    ViewingRequest, ViewingStatus, ViewingsQuery,
};
use crate::services::viewing_service::ViewingChange;
use crate::services::{EmailService, Outcome, ViewingService};
use crate::store::PgStore;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_viewings).post(request_viewing))
        .route("/:id/confirm", post(confirm_viewing))
        .route("/:id/decline", post(decline_viewing))
        .route("/:id/complete", post(complete_viewing))
        .route("/:id/cancel", post(cancel_viewing))
        .route("/:id/accept", post(accept_viewing))
        .route("/:id/tenant-decline", post(tenant_decline_viewing))
}

fn change_json(outcome: Outcome<ViewingChange>) -> Value {
    json!({
        "success": true,
        "degraded": outcome.is_degraded(),
        "data": {
            "viewing_request": outcome.value.viewing,
            "application": outcome.value.application,
        },
        "side_effects_failed": outcome.side_effects_failed,
    })
}

fn parse_status(value: Option<&str>) -> AppResult<Option<ViewingStatus>> {
    value
        .map(|s| {
            serde_json::from_value::<ViewingStatus>(Value::String(s.to_string()))
                .map_err(|_| AppError::Validation(format!("Unknown viewing status '{}'", s)))
        })
        .transpose()
}

/// Viewing requests the caller made (tenant) or received (landlord)
#[utoipa::path(
    get,
    path = "/api/v1/viewings",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(ViewingsQuery),
    responses(
        (status = 200, description = "Viewing requests", body = Vec<ViewingRequest>)
    )
)]
pub async fn list_viewings(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ViewingsQuery>,
) -> AppResult<Json<Vec<ViewingRequest>>> {
    let status = parse_status(query.status.as_deref())?;

    let viewings = sqlx::query_as::<_, ViewingRequest>(
        r#"
        SELECT v.* FROM viewing_requests v
        JOIN properties p ON p.id = v.property_id
        WHERE (CASE WHEN $1 THEN p.landlord_id = $2 ELSE v.tenant_id = $2 END)
          AND ($3::viewing_status IS NULL OR v.status = $3)
          AND ($4::uuid IS NULL OR v.property_id = $4)
        ORDER BY v.requested_date, v.requested_time
        "#,
    )
    .bind(is_landlord(&auth_user.role))
    .bind(auth_user.user_id)
    .bind(status)
    .bind(query.property_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(viewings))
}

/// Tenant asks to view a property
#[utoipa::path(
    post,
    path = "/api/v1/viewings",
    tag = "viewings",
    security(("bearer_auth" = [])),
    request_body = CreateViewingRequest,
    responses(
        (status = 200, description = "Viewing requested", body = ViewingRequest),
        (status = 409, description = "Open request exists, or property unavailable")
    )
)]
pub async fn request_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateViewingRequest>,
) -> AppResult<Json<Value>> {
    auth_user.require_tenant()?;
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .request(
            auth_user.user_id,
            payload.property_id,
            payload.requested_date,
            payload.requested_time.as_deref(),
            payload.message,
        )
        .await?;

    Ok(Json(change_json(outcome)))
}

/// Landlord confirms a requested viewing
#[utoipa::path(
    post,
    path = "/api/v1/viewings/{id}/confirm",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Viewing request ID")),
    request_body = LandlordViewingActionRequest,
    responses(
        (status = 200, description = "Confirmed", body = ViewingRequest),
        (status = 409, description = "Not awaiting the landlord")
    )
)]
pub async fn confirm_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<LandlordViewingActionRequest>>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .confirm(auth_user.user_id, id, payload.message)
        .await?;

    Ok(Json(change_json(outcome)))
}

/// Landlord declines a requested viewing
#[utoipa::path(
    post,
    path = "/api/v1/viewings/{id}/decline",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Viewing request ID")),
    request_body = LandlordViewingActionRequest,
    responses(
        (status = 200, description = "Declined", body = ViewingRequest),
        (status = 409, description = "Not awaiting the landlord")
    )
)]
pub async fn decline_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<LandlordViewingActionRequest>>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;
    let Json(payload) = payload.unwrap_or_default();
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .decline(auth_user.user_id, id, payload.message)
        .await?;

    Ok(Json(change_json(outcome)))
}

/// Landlord marks a confirmed viewing as done
#[utoipa::path(
    post,
    path = "/api/v1/viewings/{id}/complete",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Viewing request ID")),
    responses(
        (status = 200, description = "Completed; linked application awaits decision", body = ViewingRequest),
        (status = 409, description = "Viewing is not confirmed")
    )
)]
pub async fn complete_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .mark_done(auth_user.user_id, id)
        .await?;

    Ok(Json(change_json(outcome)))
}

/// Either party cancels an open viewing
#[utoipa::path(
    post,
    path = "/api/v1/viewings/{id}/cancel",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Viewing request ID")),
    responses(
        (status = 200, description = "Cancelled", body = ViewingRequest),
        (status = 409, description = "Viewing already closed")
    )
)]
pub async fn cancel_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .cancel(auth_user.user_id, id)
        .await?;

    Ok(Json(change_json(outcome)))
}

/// Tenant accepts the proposed viewing
#[utoipa::path(
    post,
    path = "/api/v1/viewings/{id}/accept",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Viewing request ID")),
    responses(
        (status = 200, description = "Accepted; application is viewing_scheduled", body = ViewingRequest),
        (status = 409, description = "Viewing is not awaiting a response")
    )
)]
pub async fn accept_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    auth_user.require_tenant()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .tenant_accept(auth_user.user_id, id)
        .await?;

    Ok(Json(change_json(outcome)))
}

/// Tenant declines the viewing, optionally taking the place unseen
#[utoipa::path(
    post,
    path = "/api/v1/viewings/{id}/tenant-decline",
    tag = "viewings",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Viewing request ID")),
    request_body = TenantDeclineViewingRequest,
    responses(
        (status = 200, description = "Declined", body = ViewingRequest),
        (status = 409, description = "Viewing already closed")
    )
)]
pub async fn tenant_decline_viewing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TenantDeclineViewingRequest>,
) -> AppResult<Json<Value>> {
    auth_user.require_tenant()?;
    payload.validate()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = ViewingService::new(&store, &mailer)
        .tenant_decline(
            auth_user.user_id,
            id,
            payload.willing_without_viewing,
            payload.reason,
        )
        .await?;

    Ok(Json(change_json(outcome)))
}
