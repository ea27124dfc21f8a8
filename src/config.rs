use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_access_expiry: i64,
    pub jwt_refresh_expiry: i64,
    pub verification_secret: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from_name: String,
    pub email_from_address: String,
    pub email_enabled: bool,
    pub app_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let jwt_secret = env::var("JWT_SECRET")?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL")?,
            verification_secret: env::var("VERIFICATION_SECRET")
                .unwrap_or_else(|_| jwt_secret.clone()),
            jwt_secret,
            jwt_access_expiry: env::var("JWT_ACCESS_EXPIRY")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .unwrap_or(900),
            jwt_refresh_expiry: env::var("JWT_REFRESH_EXPIRY")
                .unwrap_or_else(|_| "2592000".to_string())
                .parse()
                .unwrap_or(2592000),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.brevo.com/v3/smtp/email".to_string()),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "MyYard".to_string()),
            email_from_address: env::var("EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@myyard.co.za".to_string()),
            email_enabled: env::var("EMAIL_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    /// Settings for tests and local tooling: email disabled, fixed secrets.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            jwt_access_expiry: 900,
            jwt_refresh_expiry: 2592000,
            verification_secret: "test-verification-secret".to_string(),
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from_name: "MyYard".to_string(),
            email_from_address: "noreply@myyard.co.za".to_string(),
            email_enabled: false,
            app_url: "http://localhost:3000".to_string(),
        }
    }
}
