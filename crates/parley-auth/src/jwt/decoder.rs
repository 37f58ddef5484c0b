//! JWT token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use parley_core::config::AuthConfig;
use parley_core::error::AppError;

use super::claims::Claims;

/// Validates HS256 access tokens.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token string.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use parley_core::ErrorKind;
    use parley_core::types::UserId;
    use parley_entity::Identity;

    use super::*;
    use crate::jwt::JwtEncoder;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            ..AuthConfig::default()
        }
    }

    fn identity() -> Identity {
        Identity {
            id: UserId::new(),
            username: "alice".to_string(),
        }
    }

    #[test]
    fn test_issue_then_decode() {
        let cfg = config("secret");
        let who = identity();
        let (token, _) = JwtEncoder::new(&cfg).issue(&who).unwrap();
        let claims = JwtDecoder::new(&cfg).decode(&token).unwrap();
        assert_eq!(claims.user_id(), who.id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (token, _) = JwtEncoder::new(&config("one")).issue(&identity()).unwrap();
        let err = JwtDecoder::new(&config("two")).decode(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_expired_rejected() {
        let cfg = config("secret");
        let (token, _) = JwtEncoder::new(&cfg)
            .issue_with_expiry(&identity(), Utc::now() - Duration::minutes(10))
            .unwrap();
        let err = JwtDecoder::new(&cfg).decode(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.message, "Token has expired");
    }

    #[test]
    fn test_garbage_rejected() {
        let err = JwtDecoder::new(&config("secret"))
            .decode("not-a-token")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }
}
