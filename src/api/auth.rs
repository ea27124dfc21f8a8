use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::AppState;
use crate::models::{
    AuthResponse, ProfilePublic, RefreshTokenRequest, SendVerificationRequest, TokenResponse,
    UserRole, VerifyEmailRequest,
};
use crate::services::verification_service::{normalize_email, IssuedVerification};
use crate::services::{AuthService, EmailService, VerificationService};
use crate::utils::validators::validate_email;

const MAX_CODES_PER_HOUR: i64 = 5;

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct SendVerificationResponse {
    pub success: bool,
    pub message: String,
    /// Carries the email and expiry, signed against the code. Pass it back to
    /// `verify-email` together with the code from the email.
    pub token: String,
}

impl SendVerificationResponse {
    pub fn sent(issued: IssuedVerification) -> Self {
        Self {
            success: true,
            message: "Verification code sent".to_string(),
            token: issued.token,
        }
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/send-verification", post(send_verification))
        .route("/verify-email", post(verify_email))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
}

/// Email a 6-digit verification code
#[utoipa::path(
    post,
    path = "/api/v1/auth/send-verification",
    tag = "auth",
    request_body = SendVerificationRequest,
    responses(
        (status = 200, description = "Code sent", body = SendVerificationResponse),
        (status = 400, description = "Missing email"),
        (status = 429, description = "Too many codes requested"),
        (status = 500, description = "Email could not be sent")
    )
)]
pub async fn send_verification(
    State(state): State<AppState>,
    Json(payload): Json<SendVerificationRequest>,
) -> AppResult<Json<SendVerificationResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email is required".to_string()))?;

    if !validate_email(&email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }

    let recent_count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM email_verifications
        WHERE email = $1 AND created_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(&email)
    .fetch_one(&state.pool)
    .await?;

    if recent_count.0 >= MAX_CODES_PER_HOUR {
        return Err(AppError::TooManyRequests);
    }

    let issued = VerificationService::new(state.config.verification_secret.clone())
        .issue(&email, Utc::now())?;
    AuthService::save_verification_code(&state.pool, &email, &issued.code, issued.expires_at)
        .await?;

    EmailService::new(state.config.clone())
        .send_verification_code(&email, payload.name.as_deref(), &issued.code)
        .await?;

    Ok(Json(SendVerificationResponse::sent(issued)))
}

/// Check the emailed code and sign in, creating the profile on first use
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    tag = "auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> AppResult<Json<AuthResponse>> {
    let code = payload.code.trim();
    let verified = match VerificationService::new(state.config.verification_secret.clone())
        .verify(&payload.token, code, Utc::now())
    {
        Err(AppError::InvalidCode) => {
            if let Some(email) = VerificationService::claimed_email(&payload.token) {
                AuthService::record_failed_attempt(&state.pool, &email).await?;
            }
            return Err(AppError::InvalidCode);
        }
        other => other?,
    };

    AuthService::consume_verification_code(&state.pool, &verified.email, code).await?;

    let (profile, is_new_user) =
        match AuthService::get_profile_by_email(&state.pool, &verified.email).await? {
            Some(profile) => (profile, false),
            None => {
                // Admins are never self-assigned.
                let role = match payload.role {
                    Some(UserRole::Landlord) => UserRole::Landlord,
                    _ => UserRole::Tenant,
                };
                let profile = AuthService::create_profile(
                    &state.pool,
                    &verified.email,
                    role,
                    payload.first_name.as_deref(),
                    payload.last_name.as_deref(),
                )
                .await?;
                tracing::info!("Created {} profile {}", role.as_str(), profile.id);
                (profile, true)
            }
        };

    AuthService::update_last_login(&state.pool, profile.id).await?;

    let auth_service = AuthService::new(state.config.clone());
    let access_token = auth_service.generate_access_token(&profile)?;
    let refresh_token = auth_service.generate_refresh_token(&profile)?;

    let token_hash = AuthService::hash_token(&refresh_token);
    let expires_at = Utc::now() + Duration::seconds(state.config.jwt_refresh_expiry);
    AuthService::save_refresh_token(
        &state.pool,
        profile.id,
        &token_hash,
        payload.device_info.as_deref(),
        expires_at,
    )
    .await?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: ProfilePublic::from(profile),
        is_new_user,
    }))
}

/// Rotate the token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenResponse),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let auth_service = AuthService::new(state.config.clone());

    let claims = auth_service.verify_token(&payload.refresh_token)?;
    if claims.token_type != "refresh" {
        return Err(AppError::Unauthorized);
    }

    let user_id = uuid::Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    let token_hash = AuthService::hash_token(&payload.refresh_token);
    if !AuthService::refresh_token_exists(&state.pool, &token_hash).await? {
        return Err(AppError::Unauthorized);
    }

    let profile = AuthService::get_profile_by_id(&state.pool, user_id).await?;

    AuthService::delete_refresh_token(&state.pool, &token_hash).await?;

    let access_token = auth_service.generate_access_token(&profile)?;
    let refresh_token = auth_service.generate_refresh_token(&profile)?;

    let expires_at = Utc::now() + Duration::seconds(state.config.jwt_refresh_expiry);
    AuthService::save_refresh_token(
        &state.pool,
        profile.id,
        &AuthService::hash_token(&refresh_token),
        None,
        expires_at,
    )
    .await?;

    Ok(Json(TokenResponse {
        access_token,
        refresh_token,
    }))
}

/// Sign out: the refresh token stops working
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Signed out", body = LogoutResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<Json<Value>> {
    let token_hash = AuthService::hash_token(&payload.refresh_token);
    AuthService::delete_refresh_token(&state.pool, &token_hash).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Signed out"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_response_leaves_the_code_out() {
        let issued = VerificationService::new("secret")
            .issue("zanele@example.co.za", Utc::now())
            .unwrap();
        let code = issued.code.clone();
        let body = serde_json::to_value(SendVerificationResponse::sent(issued)).unwrap();

        let text = body.to_string();
        assert!(!text.contains(&code));
        assert!(body.get("code").is_none());
        assert!(body["token"].as_str().is_some());
    }
}
