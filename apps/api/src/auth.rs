//! JWT authentication module.
//!
//! Bearer tokens are issued by the identity service; this API only validates
//! them and turns the claims into a [`Caller`].
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! require_caller (middleware)
//!        │  validate signature + exp
//!        ▼
//! request.extensions ← Caller { user_id: sub, role }
//!        │
//!        ▼
//! handler(Extension(caller), ..)
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::AppState;
use meridian_core::{Caller, Role, UserId};

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// `customer` or `admin`
    pub role: Role,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: UserId::from(self.sub.as_str()),
            role: self.role,
        }
    }
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
        }
    }

    /// Generate a token for a user (tests, seed tooling).
    pub fn generate_token(&self, user_id: &str, role: Role) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Unauthenticated(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ServiceError::Unauthenticated(format!("Invalid token: {}", e)))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(ServiceError::Unauthenticated("Token has no subject".to_string()));
        }

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid bearer token and attaches the [`Caller`].
pub async fn require_caller(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthenticated("Missing Authorization header".to_string()))?;

    let token = extract_bearer_token(auth_header)
        .ok_or_else(|| ServiceError::Unauthenticated("Invalid token format".to_string()))?;

    let claims = state.jwt.validate_token(token)?;
    let caller = claims.caller();
    debug!(user_id = %caller.user_id, role = ?caller.role, "Caller authenticated");

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret".to_string(), 3600);

        let token = manager.generate_token("user-001", Role::Admin).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.caller(), Caller::admin("user-001"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtManager::new("issuer-secret".to_string(), 3600);
        let verifier = JwtManager::new("other-secret".to_string(), 3600);

        let token = issuer.generate_token("user-001", Role::Customer).unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Past the default 60s leeway
        let manager = JwtManager::new("test-secret".to_string(), -120);
        let token = manager.generate_token("user-001", Role::Customer).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
