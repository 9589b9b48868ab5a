// Endpoints under /api/users

use crate::auth::AuthUser;
use crate::core::{ApiError, AppState};
use crate::extract::{ApiJson, ApiPath};
use crate::password::{hash_password, verify_password, PasswordError};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use db::models::user::{
    LoginRequest, NewUser, RegisterRequest, UpdateUserRequest, UserChanges, UserProfile,
};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 20;
const MAX_FULL_NAME_LEN: usize = 100;

/// POST /api/users/register
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (Some(full_name), Some(username), Some(email), Some(password)) = (
        non_empty(payload.full_name),
        non_empty(payload.username),
        non_empty(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("All fields are required."));
    };

    validate_full_name(&full_name)?;
    validate_username(&username)?;
    validate_email(&email)?;
    let password_hash = hash_in_background(password).await?;

    let user = state
        .store
        .create_user(NewUser {
            full_name,
            username,
            email,
            password_hash,
            api_key: Uuid::new_v4().to_string(),
            is_admin: false,
        })
        .await?;

    info!(user = %user.id, "Registered user");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered.", "apiKey": user.api_key })),
    ))
}

/// POST /api/users/login
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(email), Some(password)) = (
        non_empty(payload.email),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("All fields are required."));
    };

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials."))?;

    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))?;
    if let Err(e) = verified {
        if matches!(e, PasswordError::InvalidHash) {
            warn!(user = %user.id, "Stored password hash is malformed");
        }
        return Err(ApiError::unauthorized("Invalid credentials."));
    }

    let token = state.jwt.issue(&user)?;
    info!(user = %user.id, "User logged in");
    Ok(Json(json!({
        "message": "Login successful.",
        "token": token,
        "apiKey": user.api_key,
    })))
}

/// GET /api/users (admin only)
pub async fn list_users_handler(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    if !caller.is_admin {
        return Err(ApiError::forbidden("Administrator access required."));
    }
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// GET /api/users/:id
pub async fn get_user_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    ensure_may_manage(&caller, id)?;
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    Ok(Json(user.into()))
}

/// PUT /api/users/:id
pub async fn update_user_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    ensure_may_manage(&caller, id)?;

    let mut changes = UserChanges::default();
    if let Some(full_name) = non_empty(payload.full_name) {
        validate_full_name(&full_name)?;
        changes.full_name = Some(full_name);
    }
    if let Some(username) = non_empty(payload.username) {
        validate_username(&username)?;
        changes.username = Some(username);
    }
    if let Some(email) = non_empty(payload.email) {
        validate_email(&email)?;
        changes.email = Some(email);
    }
    if let Some(password) = payload.password.filter(|p| !p.is_empty()) {
        changes.password_hash = Some(hash_in_background(password).await?);
    }

    let user = state
        .store
        .update_user(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    info!(user = %id, "Updated user");
    Ok(Json(json!({
        "message": "User updated.",
        "user": UserProfile::from(user),
    })))
}

/// DELETE /api/users/:id
pub async fn delete_user_handler(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Value>, ApiError> {
    ensure_may_manage(&caller, id)?;
    if !state.store.delete_user(id).await? {
        return Err(ApiError::not_found("User not found."));
    }
    info!(user = %id, "Deleted user");
    Ok(Json(json!({ "message": "User deleted." })))
}

fn ensure_may_manage(caller: &AuthUser, id: Uuid) -> Result<(), ApiError> {
    if caller.may_manage(id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only manage your own account."))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Hashing blocks; run it off the async workers.
async fn hash_in_background(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))?
        .map_err(|e| match e {
            PasswordError::TooShort | PasswordError::TooLong => ApiError::validation(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        })
}

fn validate_full_name(full_name: &str) -> Result<(), ApiError> {
    if full_name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Full name must be at most {MAX_FULL_NAME_LEN} characters."
        )));
    }
    Ok(())
}

/// Validates the username, checking for length and allowed characters.
fn validate_username(username: &str) -> Result<(), ApiError> {
    let length = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&length) {
        return Err(ApiError::validation(format!(
            "Username must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters."
        )));
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ApiError::validation(
            "Username can only contain alphanumeric characters and underscores.",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ApiError::validation("Email address is not valid."))
    }
}
