use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    error::{AppError, Result},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn generate_token(auth: &AuthConfig, email: &str) -> Result<String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::seconds(auth.token_ttl_secs as i64))
        .ok_or_else(|| AppError::InternalError("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(format!("Token generation failed: {}", e)))
}

pub fn verify_token(auth: &AuthConfig, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Could not validate credentials".to_string()))
}

/// Decode a token for refresh without enforcing expiry, then apply a bounded
/// grace window: the signature must verify and the token must not be more
/// than `refresh_grace_secs` past its expiry.
pub fn decode_for_refresh(auth: &AuthConfig, token: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = false;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Could not validate credentials".to_string()))?;

    let now = chrono::Utc::now().timestamp() as usize;
    let refresh_deadline = claims.exp.saturating_add(auth.refresh_grace_secs as usize);

    if now > refresh_deadline {
        return Err(AppError::Unauthorized(
            "Token is too old to refresh".to_string(),
        ));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 604800,
            refresh_grace_secs: 1209600,
        }
    }

    fn token_expired_secs_ago(auth: &AuthConfig, email: &str, secs: i64) -> String {
        let claims = Claims {
            sub: email.to_string(),
            exp: (chrono::Utc::now().timestamp() - secs) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn round_trip_returns_identity() {
        let auth = test_config();
        let token = generate_token(&auth, "vendor1@example.com").unwrap();
        let claims = verify_token(&auth, &token).unwrap();
        assert_eq!(claims.sub, "vendor1@example.com");
    }

    #[test]
    fn verify_rejects_expired_token() {
        let auth = test_config();
        // past the default 60s leeway
        let token = token_expired_secs_ago(&auth, "vendor1@example.com", 3600);
        assert!(matches!(
            verify_token(&auth, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let auth = test_config();
        let token = generate_token(&auth, "vendor1@example.com").unwrap();

        let other = AuthConfig {
            jwt_secret: "another-secret".to_string(),
            ..test_config()
        };
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn refresh_accepts_expired_token_within_grace() {
        let auth = test_config();
        let token = token_expired_secs_ago(&auth, "vendor1@example.com", 3600);

        let claims = decode_for_refresh(&auth, &token).unwrap();
        assert_eq!(claims.sub, "vendor1@example.com");

        // and a token minted from those claims verifies again
        let fresh = generate_token(&auth, &claims.sub).unwrap();
        assert!(verify_token(&auth, &fresh).is_ok());
    }

    #[test]
    fn refresh_rejects_token_past_grace_window() {
        let auth = AuthConfig {
            refresh_grace_secs: 60,
            ..test_config()
        };
        let token = token_expired_secs_ago(&auth, "vendor1@example.com", 3600);
        assert!(matches!(
            decode_for_refresh(&auth, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn refresh_still_requires_valid_signature() {
        let auth = test_config();
        let other = AuthConfig {
            jwt_secret: "another-secret".to_string(),
            ..test_config()
        };
        let token = token_expired_secs_ago(&other, "vendor1@example.com", 10);
        assert!(decode_for_refresh(&auth, &token).is_err());
    }
}
