use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::services::AuthService;

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

pub fn is_landlord(role: &UserRole) -> bool {
    matches!(role, UserRole::Landlord | UserRole::Admin)
}

pub fn is_tenant(role: &UserRole) -> bool {
    matches!(role, UserRole::Tenant)
}

fn parse_role(role_str: &str) -> UserRole {
    match role_str {
        "landlord" => UserRole::Landlord,
        "admin" => UserRole::Admin,
        _ => UserRole::Tenant,
    }
}

impl AuthUser {
    pub fn require_landlord(&self) -> AppResult<()> {
        if is_landlord(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_tenant(&self) -> AppResult<()> {
        if is_tenant(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Puts `AppState` into request extensions for the `AuthUser` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(state);
    next.run(request).await
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "error": { "code": "UNAUTHORIZED", "message": message }
        })),
    )
        .into_response()
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let app_state = parts
            .extensions
            .get::<AppState>()
            .cloned()
            .ok_or_else(|| AppError::Internal("AppState missing from request".to_string()).into_response())?;

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("Missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid authorization header format"))?;

        let auth_service = AuthService::new(app_state.config);
        let claims = auth_service
            .verify_token(token)
            .map_err(|_| unauthorized("Invalid or expired token"))?;

        if claims.token_type != "access" {
            return Err(unauthorized("Invalid token type"));
        }

        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| unauthorized("Invalid user ID in token"))?;
        let role = parse_role(&claims.role);

        Ok(AuthUser { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_defaults_to_tenant() {
        assert_eq!(parse_role("landlord"), UserRole::Landlord);
        assert_eq!(parse_role("admin"), UserRole::Admin);
        assert_eq!(parse_role("tenant"), UserRole::Tenant);
        assert_eq!(parse_role("superuser"), UserRole::Tenant);
    }

    #[test]
    fn test_role_guards() {
        let landlord = AuthUser {
            user_id: Uuid::new_v4(),
            role: UserRole::Landlord,
        };
        assert!(landlord.require_landlord().is_ok());
        assert!(landlord.require_tenant().is_err());
        assert!(is_landlord(&UserRole::Admin));
        assert!(!is_tenant(&UserRole::Admin));
    }
}
