use crate::auth::JwtKeys;
use crate::config::AppConfig;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use db::{ServiceError, Store};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_ttl);
        Self {
            store,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        }
    }
}

// Define a custom error type for our API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Service(ServiceError::DuplicateUser | ServiceError::PermanentExists) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Service(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Implement `IntoResponse` for `ApiError` to convert it into an HTTP response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Gone(msg) => msg,
            ApiError::Service(ServiceError::DuplicateUser) => {
                "Email or username is already in use.".to_string()
            }
            ApiError::Service(ServiceError::PermanentExists) => {
                "You already have a permanent address.".to_string()
            }
            ApiError::Service(
                e @ (ServiceError::AddressTaken | ServiceError::FailedToFindUniqueName(_)),
            ) => {
                error!("Address generation failed: {}", e);
                "Could not generate a unique email address.".to_string()
            }
            ApiError::Service(e) => {
                error!("Database error: {}", e);
                "An unexpected database error occurred.".to_string()
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error.".to_string()
            }
        };

        let body = Json(json!({ "message": message }));
        (status, body).into_response()
    }
}
