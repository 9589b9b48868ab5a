//! Bearer-token and API-key authentication.

use crate::core::{ApiError, AppState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::Utc;
use db::models::user::User;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, error};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "x-api-key";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: Uuid,
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

/// Keys and validation settings for HS256 tokens.
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Issues a token for `user` valid for the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user.id,
            email: user.email.clone(),
            admin: user.is_admin,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!("Failed to encode JWT: {}", e);
            ApiError::Internal("Failed to generate token".to_string())
        })
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, jsonwebtoken::errors::Error> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

/// The caller identified by a bearer token or a user API key.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub is_admin: bool,
}

impl AuthUser {
    /// Self-service or admin.
    pub fn may_manage(&self, user_id: Uuid) -> bool {
        self.is_admin || self.id == user_id
    }
}

impl From<JwtClaims> for AuthUser {
    fn from(claims: JwtClaims) -> Self {
        Self {
            id: claims.sub,
            is_admin: claims.admin,
        }
    }
}

/// `Some(token)` when an `Authorization: Bearer` header is present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

fn header_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn verify_bearer(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    state.jwt.verify(token).map(AuthUser::from).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::forbidden("Invalid or expired token.")
    })
}

/// Requires a caller: a bearer token, or else a user API key in `x-api-key`.
#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            return verify_bearer(state, token);
        }

        let Some(api_key) = header_api_key(&parts.headers) else {
            return Err(ApiError::unauthorized("Access denied. Token not provided."));
        };
        match state.store.find_user_by_api_key(&api_key).await? {
            Some(user) => Ok(AuthUser {
                id: user.id,
                is_admin: user.is_admin,
            }),
            None => Err(ApiError::unauthorized("Invalid API key.")),
        }
    }
}

/// Optional bearer authentication for mailbox routes, where `x-api-key`
/// carries a mailbox key instead. A present but invalid token is rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => verify_bearer(state, token).map(|user| MaybeUser(Some(user))),
            None => Ok(MaybeUser(None)),
        }
    }
}

/// Mailbox API key from the `x-api-key` header, if any.
#[derive(Debug, Clone)]
pub struct HeaderApiKey(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for HeaderApiKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(HeaderApiKey(header_api_key(&parts.headers)))
    }
}

/// Compares secrets without short-circuiting on the first differing byte.
pub fn keys_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
