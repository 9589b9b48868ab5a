// Endpoints under /api/emails, except the inbound webhook.

use crate::auth::{keys_match, AuthUser, HeaderApiKey, MaybeUser};
use crate::core::{ApiError, AppState};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use axum::{
    extract::State,
    http::header::{CONTENT_SECURITY_POLICY, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use db::{
    models::{
        email::InboxMessage,
        mailbox::{
            DeleteMailboxRequest, DeleteMessageRequest, ExpirationResponse, Mailbox, MailboxQuery,
            PermanentMailboxResponse, TemporaryMailboxResponse,
        },
    },
    services::mailbox::{create_permanent_mailbox, create_temporary_mailbox},
};
use render::{format_html, highlight_html, render_email_document, sanitize_email_html};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Rendered messages may pull remote images and inline styles, nothing else.
const RENDER_CSP: &str = "default-src 'none'; img-src * data:; style-src 'unsafe-inline'; \
     font-src * data:; base-uri 'none'; form-action 'none'";

/// POST /api/emails/generate-temporal
pub async fn generate_temporary_handler(
    State(state): State<AppState>,
) -> Result<Json<TemporaryMailboxResponse>, ApiError> {
    let mailbox = create_temporary_mailbox(
        state.store.as_ref(),
        &state.config.domain,
        state.config.temp_mailbox_ttl,
    )
    .await?;

    let expires_at = mailbox
        .expires_at
        .ok_or_else(|| ApiError::Internal("temporary mailbox without expiry".to_string()))?;

    Ok(Json(TemporaryMailboxResponse {
        id: mailbox.id,
        email: mailbox.address,
        api_key: mailbox.api_key,
        expires_at,
    }))
}

/// POST /api/emails/generate-permanent
pub async fn generate_permanent_handler(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<PermanentMailboxResponse>, ApiError> {
    // Tokens outlive deleted accounts.
    if state.store.find_user_by_id(caller.id).await?.is_none() {
        return Err(ApiError::unauthorized("User no longer exists."));
    }

    let mailbox =
        create_permanent_mailbox(state.store.as_ref(), &state.config.domain, caller.id).await?;

    Ok(Json(PermanentMailboxResponse {
        id: mailbox.id,
        email: mailbox.address,
        api_key: mailbox.api_key,
    }))
}

/// GET /api/emails/inbox
pub async fn inbox_handler(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    HeaderApiKey(header_key): HeaderApiKey,
    ApiQuery(query): ApiQuery<MailboxQuery>,
) -> Result<Json<Vec<InboxMessage>>, ApiError> {
    let address = required(query.email.as_deref(), "Email is required.")?;
    let api_key = header_key.or(query.api_key);

    let mailbox = authorize_mailbox(
        &state,
        caller.as_ref(),
        MailboxRef::Address(address),
        api_key.as_deref(),
    )
    .await?;

    let messages = state
        .store
        .list_messages(mailbox.id, query.last_email_id)
        .await?;
    Ok(Json(messages))
}

/// DELETE /api/emails/e/delete-email
pub async fn delete_message_handler(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    HeaderApiKey(header_key): HeaderApiKey,
    ApiJson(payload): ApiJson<DeleteMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let address = required(payload.email.as_deref(), "Email is required.")?;
    let message_id = payload
        .email_id
        .ok_or_else(|| ApiError::validation("Email id is required."))?;
    let api_key = header_key.or(payload.api_key);

    let mailbox = authorize_mailbox(
        &state,
        caller.as_ref(),
        MailboxRef::Address(address),
        api_key.as_deref(),
    )
    .await?;

    if !state.store.delete_message(mailbox.id, message_id).await? {
        return Err(ApiError::not_found("Email not found."));
    }

    info!(address = %mailbox.address, message = message_id, "Deleted message");
    Ok(Json(json!({ "message": "Email deleted." })))
}

/// DELETE /api/emails/a/delete-address
pub async fn delete_mailbox_handler(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    HeaderApiKey(header_key): HeaderApiKey,
    ApiJson(payload): ApiJson<DeleteMailboxRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = payload
        .id
        .ok_or_else(|| ApiError::validation("Address id is required."))?;
    let api_key = header_key.or(payload.api_key);

    let mailbox =
        authorize_mailbox(&state, caller.as_ref(), MailboxRef::Id(id), api_key.as_deref()).await?;

    if !state.store.delete_mailbox(mailbox.id).await? {
        return Err(ApiError::not_found("Mailbox not found."));
    }

    info!(address = %mailbox.address, "Deleted mailbox");
    Ok(Json(json!({ "message": "Email address deleted." })))
}

/// GET /api/emails/expiration
pub async fn expiration_handler(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    HeaderApiKey(header_key): HeaderApiKey,
    ApiQuery(query): ApiQuery<MailboxQuery>,
) -> Result<Json<ExpirationResponse>, ApiError> {
    let address = required(query.email.as_deref(), "Email is required.")?;
    let api_key = header_key.or(query.api_key);
    if caller.is_none() && api_key.is_none() {
        return Err(ApiError::validation("API key is required."));
    }

    let mailbox = authorize_mailbox(
        &state,
        caller.as_ref(),
        MailboxRef::Address(address),
        api_key.as_deref(),
    )
    .await?;

    Ok(Json(ExpirationResponse {
        expires_at: mailbox.expires_at,
        is_permanent: mailbox.is_permanent(),
        remaining_days: mailbox.remaining_days(Utc::now()),
    }))
}

/// GET /api/emails/messages/:id/render
///
/// Serves the message as a standalone page under a restrictive CSP.
pub async fn render_message_handler(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    HeaderApiKey(header_key): HeaderApiKey,
    ApiPath(message_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MailboxQuery>,
) -> Result<Response, ApiError> {
    let message = authorized_message(
        &state,
        caller,
        header_key,
        message_id,
        query.email.as_deref(),
        query.api_key,
    )
    .await?;

    let page = render_email_document(&message.subject, &message.body);
    Ok((
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CONTENT_SECURITY_POLICY, RENDER_CSP),
        ],
        page,
    )
        .into_response())
}

/// GET /api/emails/messages/:id/source
///
/// Sanitized and re-indented markup, highlighted when `highlight=true`.
pub async fn message_source_handler(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    HeaderApiKey(header_key): HeaderApiKey,
    ApiPath(message_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MailboxQuery>,
) -> Result<Response, ApiError> {
    let message = authorized_message(
        &state,
        caller,
        header_key,
        message_id,
        query.email.as_deref(),
        query.api_key,
    )
    .await?;

    let source = format_html(&sanitize_email_html(&message.body));
    let response = if query.highlight {
        (
            [
                (CONTENT_TYPE, "text/html; charset=utf-8"),
                (CONTENT_SECURITY_POLICY, RENDER_CSP),
            ],
            highlight_html(&source),
        )
            .into_response()
    } else {
        ([(CONTENT_TYPE, "text/plain; charset=utf-8")], source).into_response()
    };
    Ok(response)
}

enum MailboxRef<'a> {
    Address(&'a str),
    Id(Uuid),
}

/// Resolves a live mailbox the caller may access.
///
/// A signed-in caller passes as the owner or by holding the key, and gets
/// 403 otherwise. Anonymous callers need the key; any miss is a 404 so the
/// response never reveals whether the address exists.
async fn authorize_mailbox(
    state: &AppState,
    caller: Option<&AuthUser>,
    target: MailboxRef<'_>,
    api_key: Option<&str>,
) -> Result<Mailbox, ApiError> {
    let found = match target {
        MailboxRef::Address(address) => state.store.find_mailbox_by_address(address).await?,
        MailboxRef::Id(id) => state.store.find_mailbox_by_id(id).await?,
    };
    let now = Utc::now();
    let mailbox = found.filter(|mailbox| !mailbox.is_expired_at(now));

    let key_ok = |mailbox: &Mailbox| api_key.is_some_and(|key| keys_match(key, &mailbox.api_key));

    match (caller, mailbox) {
        (Some(user), Some(mailbox)) => {
            if mailbox.is_owned_by(user.id) || key_ok(&mailbox) {
                Ok(mailbox)
            } else {
                Err(ApiError::forbidden("You do not have access to this address."))
            }
        }
        (Some(_), None) => Err(ApiError::not_found("Mailbox not found.")),
        (None, Some(mailbox)) if key_ok(&mailbox) => Ok(mailbox),
        (None, _) => Err(ApiError::not_found(
            "Mailbox not found or incorrect API key.",
        )),
    }
}

async fn authorized_message(
    state: &AppState,
    caller: Option<AuthUser>,
    header_key: Option<String>,
    message_id: i64,
    email: Option<&str>,
    query_key: Option<String>,
) -> Result<InboxMessage, ApiError> {
    let address = required(email, "Email is required.")?;
    let api_key = header_key.or(query_key);

    let mailbox = authorize_mailbox(
        state,
        caller.as_ref(),
        MailboxRef::Address(address),
        api_key.as_deref(),
    )
    .await?;

    state
        .store
        .find_message(mailbox.id, message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found."))
}

fn required<'a>(value: Option<&'a str>, message: &'static str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(message))
}
