use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::config::Config;

pub mod guard;

/// How long an issued token stays valid.
const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Represents the caller identified by a valid bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Authentication state containing the JWT secret.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub sub: Uuid,  // ID of the authenticated user
}

/// Custom error type for authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Represents an error during JWT operations.
    #[error("JWT operation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Issues a token for `user_id`, valid for 24 hours.
pub fn encode_jwt(user_id: Uuid, jwt_secret: &str) -> Result<String, AuthError> {
    let now = chrono::Utc::now();
    let expire = chrono::Duration::hours(TOKEN_LIFETIME_HOURS);
    let exp = (now + expire).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        exp,
        iat,
        sub: user_id,
    };
    let jwt = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, AuthError> {
    let token_data = jsonwebtoken::decode(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
