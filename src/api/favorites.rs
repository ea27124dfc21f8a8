use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthUser};
use crate::models::Property;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites))
        .route("/:property_id", post(toggle_favorite))
}

/// Saved properties, most recently saved first
#[utoipa::path(
    get,
    path = "/api/v1/favorites",
    tag = "favorites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Saved properties", body = Vec<Property>)
    )
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<Property>>> {
    let properties = sqlx::query_as::<_, Property>(
        r#"
        SELECT p.* FROM favorites f
        JOIN properties p ON p.id = f.property_id
        WHERE f.user_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(properties))
}

/// Save a property, or unsave it if already saved
#[utoipa::path(
    post,
    path = "/api/v1/favorites/{property_id}",
    tag = "favorites",
    security(("bearer_auth" = [])),
    params(("property_id" = Uuid, Path, description = "Property ID")),
    responses(
        (status = 200, description = "`favorited` is the new state"),
        (status = 404, description = "Property not found")
    )
)]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND property_id = $2")
        .bind(auth_user.user_id)
        .bind(property_id)
        .execute(&state.pool)
        .await?;

    if removed.rows_affected() > 0 {
        return Ok(Json(json!({"success": true, "favorited": false})));
    }

    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM properties WHERE id = $1")
        .bind(property_id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Property not found".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO favorites (user_id, property_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, property_id) DO NOTHING
        "#,
    )
    .bind(auth_user.user_id)
    .bind(property_id)
    .execute(&state.pool)
    .await?;

    Ok(Json(json!({"success": true, "favorited": true})))
}
