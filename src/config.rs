use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// HMAC secret shared with the identity service that issues tokens.
    pub jwt_secret: String,
    /// Browser client origin for CORS; unset means any origin (dev mode).
    pub client_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.len() < 32 {
            return Err(crate::error::AppError::Config(
                "JWT_SECRET must be at least 32 bytes".into(),
            ));
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let client_url = env::var("CLIENT_URL").ok().filter(|s| !s.is_empty());

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            client_url,
        })
    }

    /// Fixed configuration for tests that never reaches a real database.
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/marketplace_chat_test".into(),
            port: 0,
            jwt_secret: "test-secret-test-secret-test-secret-00".into(),
            client_url: None,
        }
    }
}
