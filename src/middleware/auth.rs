use crate::error::AppError;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user id
    pub sub: String,
    /// Expiration time (unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized)
    }
}

/// Validate an HS256 token and extract its claims. Verification is local and
/// synchronous, so the connection handshake cannot stall on it.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Sign a token for a user. The identity service owns token issuance in
/// production; this exists for tooling and tests.
pub fn issue_token(secret: &str, user_id: Uuid, ttl_secs: i64) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-test-secret-test-secret-00";

    #[test]
    fn round_trips_a_valid_token() {
        let user = Uuid::new_v4();
        let token = issue_token(SECRET, user, 60).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = issue_token(SECRET, Uuid::new_v4(), 60).unwrap();
        assert!(matches!(
            verify_token("another-secret-another-secret-0000", &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let token = issue_token(SECRET, Uuid::new_v4(), -120).unwrap();
        assert!(matches!(
            verify_token(SECRET, &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(verify_token(SECRET, "not.a.token").is_err());
    }
}
