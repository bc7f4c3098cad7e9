/// Authentication extractors and utilities
///
/// API callers present an HS256 JWT issued by the account service. The `sub`
/// claim is the local user id.
use crate::{
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Missing authorization header".to_string()))?;

        let user_id = verify_access_token(bearer.token(), &state.config.security.jwt_secret)?;

        Ok(AuthContext { user_id })
    }
}

/// Check signature and expiry, returning the user id
pub fn verify_access_token(token: &str, secret: &str) -> AppResult<String> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| AppError::Authentication(format!("Invalid access token: {}", e)))?;

    if data.claims.sub.is_empty() {
        return Err(AppError::Authentication("Token has no subject".to_string()));
    }

    Ok(data.claims.sub)
}

/// Mint an access token (operations tooling and tests)
pub fn issue_access_token(user_id: &str, secret: &str, ttl_secs: i64) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}
