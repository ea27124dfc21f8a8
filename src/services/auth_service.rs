use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{EmailVerification, Profile, UserRole};
use crate::services::verification_service::MAX_CODE_ATTEMPTS;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // profile id
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

pub struct AuthService {
    config: Config,
}

impl AuthService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn generate_access_token(&self, profile: &Profile) -> AppResult<String> {
        self.generate_token(profile, "access", self.config.jwt_access_expiry)
    }

    pub fn generate_refresh_token(&self, profile: &Profile) -> AppResult<String> {
        self.generate_token(profile, "refresh", self.config.jwt_refresh_expiry)
    }

    fn generate_token(&self, profile: &Profile, token_type: &str, ttl: i64) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl);

        let claims = Claims {
            sub: profile.id.to_string(),
            role: profile.role.as_str().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        };

        // Two tokens minted in the same second must still hash differently.
        let mut header = Header::default();
        header.kid = Some(Uuid::new_v4().to_string());

        encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(AppError::from)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    pub async fn get_profile_by_id(pool: &PgPool, id: Uuid) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_profile_by_email(pool: &PgPool, email: &str) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(profile)
    }

    pub async fn create_profile(
        pool: &PgPool,
        email: &str,
        role: UserRole,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> AppResult<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (email, role, first_name, last_name, is_verified)
            VALUES ($1, $2, $3, $4, true)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(role)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(pool)
        .await?;

        Ok(profile)
    }

    pub async fn save_verification_code(
        pool: &PgPool,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_verifications (email, code, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Re-checks a code against the server-side record, so a token alone is never enough.
    pub async fn consume_verification_code(pool: &PgPool, email: &str, code: &str) -> AppResult<()> {
        let latest = sqlx::query_as::<_, EmailVerification>(
            r#"
            SELECT * FROM email_verifications
            WHERE email = $1 AND is_used = false
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::InvalidCode)?;

        if latest.attempts >= MAX_CODE_ATTEMPTS {
            return Err(AppError::TooManyAttempts);
        }
        if latest.expires_at <= Utc::now() {
            return Err(AppError::CodeExpired);
        }

        if latest.code != code {
            sqlx::query("UPDATE email_verifications SET attempts = attempts + 1 WHERE id = $1")
                .bind(latest.id)
                .execute(pool)
                .await?;
            return Err(AppError::InvalidCode);
        }

        sqlx::query(
            "UPDATE email_verifications SET is_used = true, attempts = attempts + 1 WHERE id = $1",
        )
        .bind(latest.id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Counts a wrong code against the latest open code for `email`. Errors once the
    /// attempts were already used up.
    pub async fn record_failed_attempt(pool: &PgPool, email: &str) -> AppResult<()> {
        let attempts: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE email_verifications SET attempts = attempts + 1
            WHERE id = (
                SELECT id FROM email_verifications
                WHERE email = $1 AND is_used = false
                ORDER BY created_at DESC
                LIMIT 1
            )
            RETURNING attempts
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        match attempts {
            Some((n,)) if n > MAX_CODE_ATTEMPTS => Err(AppError::TooManyAttempts),
            _ => Ok(()),
        }
    }

    pub async fn save_refresh_token(
        pool: &PgPool,
        user_id: Uuid,
        token_hash: &str,
        device_info: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, device_info, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(device_info)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn refresh_token_exists(pool: &PgPool, token_hash: &str) -> AppResult<bool> {
        let row = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM refresh_tokens WHERE token_hash = $1 AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn delete_refresh_token(pool: &PgPool, token_hash: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn delete_all_refresh_tokens(pool: &PgPool, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn update_last_login(pool: &PgPool, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE profiles SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub fn hash_token(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: UserRole) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            email: "landlord@example.co.za".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            role,
            is_verified: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_token_round_trips_claims() {
        let service = AuthService::new(Config::for_tests());
        let p = profile(UserRole::Landlord);
        let token = service.generate_access_token(&p).unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, p.id.to_string());
        assert_eq!(claims.role, "landlord");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let p = profile(UserRole::Tenant);
        let token = AuthService::new(Config::for_tests())
            .generate_refresh_token(&p)
            .unwrap();
        let mut other = Config::for_tests();
        other.jwt_secret = "different".to_string();
        assert!(AuthService::new(other).verify_token(&token).is_err());
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = AuthService::hash_token("abc");
        assert_eq!(a, AuthService::hash_token("abc"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, AuthService::hash_token("abd"));
    }
}
