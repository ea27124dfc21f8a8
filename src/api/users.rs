use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{AppState, AuthUser};
use crate::models::{Profile, ProfilePublic, UpdateProfileRequest};
use crate::services::AuthService;
use crate::utils::validators::{normalize_phone, sanitize_string, validate_phone};

pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(update_me))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfilePublic),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<ProfilePublic>> {
    let profile = AuthService::get_profile_by_id(&state.pool, auth_user.user_id).await?;
    Ok(Json(ProfilePublic::from(profile)))
}

/// Update name and phone
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfilePublic),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Invalid phone number")
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ProfilePublic>> {
    payload.validate()?;

    let phone = match payload.phone.as_deref() {
        Some(raw) => {
            let phone = normalize_phone(raw);
            if !validate_phone(&phone) {
                return Err(AppError::Validation("Invalid phone number".to_string()));
            }
            Some(phone)
        }
        None => None,
    };

    let profile = sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles
        SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.user_id)
    .bind(payload.first_name.as_deref().map(sanitize_string))
    .bind(payload.last_name.as_deref().map(sanitize_string))
    .bind(phone)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfilePublic::from(profile)))
}
