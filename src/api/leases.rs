use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::outcome_json;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{LeaseConfig, LeaseState};
use crate::middleware::{AppState, AuthUser};
use crate::models::{CreateLeaseRequest, Lease, LeaseResponse, Property};
use crate::api::payments::move_in_settled;
use crate::services::lease_service::DraftLease;
use crate::services::{EmailService, LeaseService};
use crate::store::{PgStore, RentalStore};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leases).post(create_lease))
        .route("/:id", get(get_lease))
        .route("/:id/sign", post(sign_lease))
        .route("/:id/cancel", post(cancel_lease))
        .route("/:id/unlist", post(unlist_property))
        .route("/:id/relist", post(relist_property))
}

/// True once paid payments cover everything the move-in breakdown asks for, admin fee included.
pub(crate) async fn move_in_paid(state: &AppState, lease: &Lease) -> AppResult<bool> {
    let paid: (Option<rust_decimal::Decimal>,) = sqlx::query_as(
        "SELECT SUM(amount) FROM payments WHERE lease_id = $1 AND status = 'paid'",
    )
    .bind(lease.id)
    .fetch_one(&state.pool)
    .await?;

    move_in_settled(lease, paid.0.unwrap_or_default())
}

async fn build_response(state: &AppState, lease: Lease) -> AppResult<LeaseResponse> {
    let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
        .bind(lease.property_id)
        .fetch_optional(&state.pool)
        .await?;

    let paid = move_in_paid(state, &lease).await?;
    let state_now = LeaseState::derive(&lease, paid, Utc::now().date_naive());
    let terms = lease
        .config
        .as_ref()
        .map(LeaseConfig::from_json)
        .transpose()?;

    Ok(LeaseResponse {
        state: state_now,
        state_label: state_now.label().to_string(),
        terms,
        property_title: property.as_ref().map(|p| p.title.clone()),
        property_status: property.map(|p| p.status),
        lease,
    })
}

/// Leases the caller is party to
#[utoipa::path(
    get,
    path = "/api/v1/leases",
    tag = "leases",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Leases", body = Vec<LeaseResponse>)
    )
)]
pub async fn list_leases(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<LeaseResponse>>> {
    let leases = sqlx::query_as::<_, Lease>(
        r#"
        SELECT * FROM leases
        WHERE tenant_id = $1 OR landlord_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let mut response = Vec::with_capacity(leases.len());
    for lease in leases {
        response.push(build_response(&state, lease).await?);
    }
    Ok(Json(response))
}

/// Lease with its derived state and terms
#[utoipa::path(
    get,
    path = "/api/v1/leases/{id}",
    tag = "leases",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lease ID")),
    responses(
        (status = 200, description = "Lease", body = LeaseResponse),
        (status = 403, description = "Not a party to the lease"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_lease(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LeaseResponse>> {
    let lease = PgStore::new(state.pool.clone())
        .get_lease(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lease not found".to_string()))?;
    if lease.tenant_id != auth_user.user_id && lease.landlord_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }

    Ok(Json(build_response(&state, lease).await?))
}

/// Landlord draws up lease terms for an approved tenant
#[utoipa::path(
    post,
    path = "/api/v1/leases",
    tag = "leases",
    security(("bearer_auth" = [])),
    request_body = CreateLeaseRequest,
    responses(
        (status = 200, description = "Lease drawn up", body = Lease),
        (status = 400, description = "Tenant has no approved application"),
        (status = 409, description = "Lease already signed or cancelled"),
        (status = 422, description = "Invalid terms")
    )
)]
pub async fn create_lease(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateLeaseRequest>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = LeaseService::new(&store, &mailer)
        .create(
            auth_user.user_id,
            DraftLease {
                property_id: payload.property_id,
                tenant_id: payload.tenant_id,
                start_date: payload.start_date,
                monthly_rent: payload.monthly_rent,
                terms: payload.terms,
            },
        )
        .await?;

    Ok(Json(outcome_json(outcome)))
}

/// Sign as landlord or tenant
#[utoipa::path(
    post,
    path = "/api/v1/leases/{id}/sign",
    tag = "leases",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lease ID")),
    responses(
        (status = 200, description = "Signed", body = Lease),
        (status = 409, description = "Already signed, cancelled, or landlord has not signed")
    )
)]
pub async fn sign_lease(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = LeaseService::new(&store, &mailer)
        .sign(auth_user.user_id, id)
        .await?;

    Ok(Json(outcome_json(outcome)))
}

/// Either party gives notice on a lease
#[utoipa::path(
    post,
    path = "/api/v1/leases/{id}/cancel",
    tag = "leases",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lease ID")),
    responses(
        (status = 200, description = "Cancellation recorded", body = Lease),
        (status = 403, description = "Not a party to the lease"),
        (status = 409, description = "Already cancelled")
    )
)]
pub async fn cancel_lease(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let outcome = LeaseService::new(&store, &mailer)
        .cancel(auth_user.user_id, id)
        .await?;

    Ok(Json(outcome_json(outcome)))
}

/// Take the lease's property off the market
#[utoipa::path(
    post,
    path = "/api/v1/leases/{id}/unlist",
    tag = "leases",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lease ID")),
    responses(
        (status = 200, description = "Property unlisted", body = Property),
        (status = 409, description = "Property cannot be unlisted from its status")
    )
)]
pub async fn unlist_property(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let property = LeaseService::new(&store, &mailer)
        .unlist(auth_user.user_id, id)
        .await?;

    Ok(Json(json!({ "success": true, "data": property })))
}

/// Put the lease's property back on the market
#[utoipa::path(
    post,
    path = "/api/v1/leases/{id}/relist",
    tag = "leases",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lease ID")),
    responses(
        (status = 200, description = "Property relisted", body = Property),
        (status = 409, description = "Property is not unlisted")
    )
)]
pub async fn relist_property(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    auth_user.require_landlord()?;

    let store = PgStore::new(state.pool.clone());
    let mailer = EmailService::new(state.config.clone());
    let property = LeaseService::new(&store, &mailer)
        .relist(auth_user.user_id, id)
        .await?;

    Ok(Json(json!({ "success": true, "data": property })))
}
