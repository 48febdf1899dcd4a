//! Session tokens
//!
//! Accounts live in the identity service that issues bearer tokens; this
//! service only checks them and reads the caller's id, name and role.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    error::{AppError, AppResult},
};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Verify and decode a JWT token
    pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }

    /// Sign a token for `user_id`, valid for the configured number of hours
    pub fn issue_token(
        config: &JwtConfig,
        user_id: Uuid,
        username: &str,
        role: &str,
    ) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.to_string(),
            exp: (now + Duration::hours(config.expiry_hours)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token generation failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies() {
        let config = JwtConfig::default();
        let user_id = Uuid::new_v4();
        let token = AuthService::issue_token(&config, user_id, "alice", "participant").unwrap();

        let claims = AuthService::verify_token(&token, &config.secret).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "participant");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let config = JwtConfig::default();
        let token = AuthService::issue_token(&config, Uuid::new_v4(), "alice", "admin").unwrap();

        let result = AuthService::verify_token(&token, "another-secret");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig {
            expiry_hours: -2,
            ..JwtConfig::default()
        };
        let token = AuthService::issue_token(&config, Uuid::new_v4(), "alice", "admin").unwrap();

        let result = AuthService::verify_token(&token, &config.secret);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }
}
