use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::lifecycle::property as property_lifecycle;
use crate::middleware::{AppState, AuthUser};
use crate::models::{
    CreatePropertyRequest, PropertiesQuery, Property, PropertyStatus, UpdatePropertyRequest,
};
use crate::utils::validators::{page_bounds, sanitize_string};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_properties).post(create_property))
        .route("/mine", get(my_properties))
        .route("/:id", get(get_property).put(update_property))
}

/// Browse listed properties
#[utoipa::path(
    get,
    path = "/api/v1/properties",
    tag = "properties",
    params(PropertiesQuery),
    responses(
        (status = 200, description = "Available properties", body = Vec<Property>)
    )
)]
pub async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertiesQuery>,
) -> AppResult<Json<Vec<Property>>> {
    let (limit, offset) = page_bounds(query.page, query.limit);
    let search = query
        .search
        .as_deref()
        .map(sanitize_string)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let properties = sqlx::query_as::<_, Property>(
        r#"
        SELECT * FROM properties
        WHERE status = 'available' AND is_active = true
          AND ($1::varchar IS NULL OR township ILIKE $1)
          AND ($2::numeric IS NULL OR rent_amount >= $2)
          AND ($3::numeric IS NULL OR rent_amount <= $3)
          AND ($4::varchar IS NULL OR title ILIKE $4 OR address ILIKE $4)
        ORDER BY created_at DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(query.township.as_deref().map(sanitize_string))
    .bind(query.min_rent)
    .bind(query.max_rent)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(properties))
}

/// Property details
#[utoipa::path(
    get,
    path = "/api/v1/properties/{id}",
    tag = "properties",
    params(("id" = Uuid, Path, description = "Property ID")),
    responses(
        (status = 200, description = "Property", body = Property),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Property>> {
    let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found".to_string()))?;

    Ok(Json(property))
}

/// Landlord's own properties, whatever their status
#[utoipa::path(
    get,
    path = "/api/v1/properties/mine",
    tag = "properties",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own properties", body = Vec<Property>),
        (status = 403, description = "Not a landlord")
    )
)]
pub async fn my_properties(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<Property>>> {
    auth_user.require_landlord()?;

    let properties = sqlx::query_as::<_, Property>(
        "SELECT * FROM properties WHERE landlord_id = $1 ORDER BY created_at DESC",
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(properties))
}

/// List a new property
#[utoipa::path(
    post,
    path = "/api/v1/properties",
    tag = "properties",
    security(("bearer_auth" = [])),
    request_body = CreatePropertyRequest,
    responses(
        (status = 200, description = "Property listed", body = Property),
        (status = 403, description = "Not a landlord"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_property(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePropertyRequest>,
) -> AppResult<Json<Property>> {
    auth_user.require_landlord()?;
    payload.validate()?;
    check_amounts(Some(payload.rent_amount), payload.deposit_amount)?;

    let property = sqlx::query_as::<_, Property>(
        r#"
        INSERT INTO properties (
            landlord_id, title, description, address, township, rent_amount, deposit_amount,
            water_included, electricity_included, gas_included, status, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'available', true)
        RETURNING *
        "#,
    )
    .bind(auth_user.user_id)
    .bind(sanitize_string(&payload.title))
    .bind(&payload.description)
    .bind(sanitize_string(&payload.address))
    .bind(payload.township.as_deref().map(sanitize_string))
    .bind(payload.rent_amount)
    .bind(payload.deposit_amount)
    .bind(payload.water_included)
    .bind(payload.electricity_included)
    .bind(payload.gas_included)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("Property {} listed by {}", property.id, auth_user.user_id);
    Ok(Json(property))
}

/// Edit a property. `is_active` always follows `status`; `occupied` is only reached by approving an application.
#[utoipa::path(
    put,
    path = "/api/v1/properties/{id}",
    tag = "properties",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Property ID")),
    request_body = UpdatePropertyRequest,
    responses(
        (status = 200, description = "Property updated", body = Property),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Status change not allowed from the current status")
    )
)]
pub async fn update_property(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePropertyRequest>,
) -> AppResult<Json<Property>> {
    payload.validate()?;
    check_amounts(payload.rent_amount, payload.deposit_amount)?;

    let current: Option<(Uuid, PropertyStatus)> =
        sqlx::query_as("SELECT landlord_id, status FROM properties WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let status = match current {
        None => return Err(AppError::NotFound("Property not found".to_string())),
        Some((landlord_id, _)) if landlord_id != auth_user.user_id => {
            return Err(AppError::Forbidden)
        }
        Some((_, status)) => status,
    };

    let next = payload
        .status
        .map(|target| property_lifecycle::change_to(status, target))
        .transpose()?;
    let is_active = next.map(|s| s.is_active());

    let property = sqlx::query_as::<_, Property>(
        r#"
        UPDATE properties
        SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            township = COALESCE($4, township),
            rent_amount = COALESCE($5, rent_amount),
            deposit_amount = COALESCE($6, deposit_amount),
            water_included = COALESCE($7, water_included),
            electricity_included = COALESCE($8, electricity_included),
            gas_included = COALESCE($9, gas_included),
            status = COALESCE($10, status),
            is_active = COALESCE($11, is_active),
            updated_at = NOW()
        WHERE id = $1 AND status = $12
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.title.as_deref().map(sanitize_string))
    .bind(&payload.description)
    .bind(payload.township.as_deref().map(sanitize_string))
    .bind(payload.rent_amount)
    .bind(payload.deposit_amount)
    .bind(payload.water_included)
    .bind(payload.electricity_included)
    .bind(payload.gas_included)
    .bind(next)
    .bind(is_active)
    .bind(status)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        AppError::Conflict("Property status changed; reload and try again".to_string())
    })?;

    Ok(Json(property))
}

fn check_amounts(rent: Option<Decimal>, deposit: Option<Decimal>) -> AppResult<()> {
    if rent.map_or(false, |r| r <= Decimal::ZERO) {
        return Err(AppError::Validation("Rent must be positive".to_string()));
    }
    if deposit.map_or(false, |d| d < Decimal::ZERO) {
        return Err(AppError::Validation("Deposit cannot be negative".to_string()));
    }
    Ok(())
}
