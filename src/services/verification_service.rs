use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const CODE_TTL_MINUTES: i64 = 10;
pub const MAX_CODE_ATTEMPTS: i32 = 3;

/// What a verification token carries. `expires` is milliseconds since the epoch.
/// The code itself never travels in the token; it only keys the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPayload {
    pub email: String,
    pub expires: i64,
}

impl VerificationPayload {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedVerification {
    pub code: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks email verification tokens: `base64url(payload).base64url(hmac(payload.code))`.
pub struct VerificationService {
    secret: String,
}

impl VerificationService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn generate_code() -> String {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(100000..1000000))
    }

    pub fn issue(&self, email: &str, now: DateTime<Utc>) -> AppResult<IssuedVerification> {
        let code = Self::generate_code();
        let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);
        let token = self.encode(
            &VerificationPayload {
                email: normalize_email(email),
                expires: expires_at.timestamp_millis(),
            },
            &code,
        )?;
        Ok(IssuedVerification {
            code,
            token,
            expires_at,
        })
    }

    pub fn encode(&self, payload: &VerificationPayload, code: &str) -> AppResult<String> {
        let json = serde_json::to_vec(payload).map_err(|e| AppError::Internal(e.to_string()))?;
        let body = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&body, code)?);
        Ok(format!("{}.{}", body, signature))
    }

    /// Reads the email a token names without trusting it. Only good for attributing a
    /// failed attempt.
    pub fn claimed_email(token: &str) -> Option<String> {
        let (body, _) = token.split_once('.')?;
        let json = URL_SAFE_NO_PAD.decode(body).ok()?;
        serde_json::from_slice::<VerificationPayload>(&json)
            .ok()
            .map(|p| p.email)
    }

    /// Recomputes the signature with the code the user typed, so a wrong code and a
    /// tampered payload both fail as `InvalidCode`. Expiry is checked after that.
    pub fn verify(
        &self,
        token: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<VerificationPayload> {
        let (body, signature) = token
            .split_once('.')
            .ok_or_else(|| AppError::BadRequest("Malformed verification token".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AppError::BadRequest("Malformed verification token".to_string()))?;
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        mac.update(b".");
        mac.update(code.trim().as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::InvalidCode)?;

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| AppError::BadRequest("Malformed verification token".to_string()))?;
        let payload: VerificationPayload = serde_json::from_slice(&json)
            .map_err(|_| AppError::BadRequest("Malformed verification token".to_string()))?;

        if payload.expires <= now.timestamp_millis() {
            return Err(AppError::CodeExpired);
        }

        Ok(payload)
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    fn sign(&self, body: &str, code: &str) -> AppResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(body.as_bytes());
        mac.update(b".");
        mac.update(code.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
