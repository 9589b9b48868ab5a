// POST /api/emails/mailgun, Mailgun's inbound route forwarding.

use crate::core::AppState;
use crate::extract::ApiForm;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use db::{models::email::NewInboxMessage, ServiceError};
use ring::hmac;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Signed posts older (or further in the future) than this are replays.
const MAX_SIGNATURE_AGE_SECS: i64 = 5 * 60;

/// The components of Mailgun's signature.
pub struct MailgunSignature<'a> {
    timestamp: &'a str,
    token: &'a str,
    signature: &'a str,
}

impl MailgunSignature<'_> {
    /// Verifies HMAC-SHA256(signing key, timestamp + token) and that the
    /// timestamp is within [`MAX_SIGNATURE_AGE_SECS`] of `now`.
    fn verify(&self, signing_key: &str, now: i64) -> Result<(), WebhookError> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, signing_key.as_bytes());
        let mut message = String::with_capacity(self.timestamp.len() + self.token.len());
        message.push_str(self.timestamp);
        message.push_str(self.token);

        let decoded_signature = hex::decode(self.signature)
            .map_err(|_| WebhookError::SignatureVerificationFailed("Invalid signature format"))?;

        hmac::verify(&key, message.as_bytes(), &decoded_signature)
            .map_err(|_| WebhookError::SignatureVerificationFailed("Signature mismatch"))?;

        let timestamp: i64 = self
            .timestamp
            .parse()
            .map_err(|_| WebhookError::SignatureVerificationFailed("Invalid timestamp"))?;
        if (now - timestamp).abs() > MAX_SIGNATURE_AGE_SECS {
            return Err(WebhookError::SignatureVerificationFailed("Stale timestamp"));
        }
        Ok(())
    }
}

/// Form fields posted by Mailgun. Only those the inbox keeps are read.
#[derive(Debug, Default, Deserialize)]
pub struct MailgunPayload {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "body-plain")]
    pub body_plain: Option<String>,
    #[serde(rename = "body-html")]
    pub body_html: Option<String>,
    pub timestamp: Option<String>,
    pub token: Option<String>,
    pub signature: Option<String>,
}

impl MailgunPayload {
    fn signature(&self) -> Result<MailgunSignature<'_>, WebhookError> {
        Ok(MailgunSignature {
            timestamp: signature_field(&self.timestamp, "Missing timestamp")?,
            token: signature_field(&self.token, "Missing token")?,
            signature: signature_field(&self.signature, "Missing signature")?,
        })
    }

    /// HTML wins over plain text when both are present.
    fn body(&self) -> &str {
        self.body_html
            .as_deref()
            .filter(|html| !html.trim().is_empty())
            .or(self.body_plain.as_deref())
            .unwrap_or_default()
    }
}

fn signature_field<'a>(
    value: &'a Option<String>,
    reason: &'static str,
) -> Result<&'a str, WebhookError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::SignatureVerificationFailed(reason))
}

#[derive(Debug)]
pub enum WebhookError {
    SignatureVerificationFailed(&'static str),
    MissingRecipient,
    MailboxNotFound,
    MailboxExpired,
    Service(ServiceError),
}

impl From<ServiceError> for WebhookError {
    fn from(e: ServiceError) -> Self {
        WebhookError::Service(e)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookError::SignatureVerificationFailed(reason) => (
                StatusCode::UNAUTHORIZED,
                format!("Signature verification failed: {}", reason),
            ),
            WebhookError::MissingRecipient => {
                (StatusCode::BAD_REQUEST, "Recipient is required.".to_string())
            }
            WebhookError::MailboxNotFound => {
                (StatusCode::NOT_FOUND, "Recipient address not found.".to_string())
            }
            WebhookError::MailboxExpired => {
                (StatusCode::GONE, "Recipient address has expired.".to_string())
            }
            WebhookError::Service(e) => {
                error!("Failed to store inbound email: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected database error occurred.".to_string(),
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

pub async fn mailgun_webhook_handler(
    State(state): State<AppState>,
    ApiForm(payload): ApiForm<MailgunPayload>,
) -> Result<Json<Value>, WebhookError> {
    if let Some(signing_key) = state.config.mailgun_signing_key.as_deref() {
        let verified = payload
            .signature()
            .and_then(|sig| sig.verify(signing_key, Utc::now().timestamp()));
        if let Err(e) = verified {
            warn!("Rejected webhook post: {:?}", e);
            return Err(e);
        }
    }

    let recipient = payload
        .recipient
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(WebhookError::MissingRecipient)?;

    let mailbox = state
        .store
        .find_mailbox_by_address(recipient)
        .await?
        .ok_or(WebhookError::MailboxNotFound)?;
    if mailbox.is_expired_at(Utc::now()) {
        return Err(WebhookError::MailboxExpired);
    }

    let sender = payload.sender.as_deref().unwrap_or_default();
    let message = NewInboxMessage {
        sender,
        subject: payload.subject.as_deref().unwrap_or_default(),
        body: payload.body(),
    };
    let stored = state.store.append_message(mailbox.id, &message).await?;

    info!(
        address = %mailbox.address,
        message = stored.id,
        "Received email from {}", sender
    );
    Ok(Json(json!({ "message": "Email received." })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(key: &str, timestamp: &str, token: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
        hex::encode(hmac::sign(&key, format!("{timestamp}{token}").as_bytes()))
    }

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_signature_roundtrip() {
        let signature = sign("key-1", "1700000000", "tok");
        let sig = MailgunSignature {
            timestamp: "1700000000",
            token: "tok",
            signature: &signature,
        };
        assert!(sig.verify("key-1", NOW).is_ok());
        assert!(sig.verify("key-1", NOW + 60).is_ok());
        assert!(matches!(
            sig.verify("key-2", NOW),
            Err(WebhookError::SignatureVerificationFailed("Signature mismatch"))
        ));
    }

    #[test]
    fn test_signature_not_hex() {
        let sig = MailgunSignature {
            timestamp: "1",
            token: "t",
            signature: "zz",
        };
        assert!(matches!(
            sig.verify("key", NOW),
            Err(WebhookError::SignatureVerificationFailed("Invalid signature format"))
        ));
    }

    #[test]
    fn test_replayed_signature_rejected() {
        let signature = sign("key-1", "1700000000", "tok");
        let sig = MailgunSignature {
            timestamp: "1700000000",
            token: "tok",
            signature: &signature,
        };
        let late = NOW + MAX_SIGNATURE_AGE_SECS + 1;
        assert!(matches!(
            sig.verify("key-1", late),
            Err(WebhookError::SignatureVerificationFailed("Stale timestamp"))
        ));
        let early = NOW - MAX_SIGNATURE_AGE_SECS - 1;
        assert!(matches!(
            sig.verify("key-1", early),
            Err(WebhookError::SignatureVerificationFailed("Stale timestamp"))
        ));
    }

    #[test]
    fn test_signed_timestamp_must_be_numeric() {
        let signature = sign("key-1", "yesterday", "tok");
        let sig = MailgunSignature {
            timestamp: "yesterday",
            token: "tok",
            signature: &signature,
        };
        assert!(matches!(
            sig.verify("key-1", NOW),
            Err(WebhookError::SignatureVerificationFailed("Invalid timestamp"))
        ));
    }

    #[test]
    fn test_body_prefers_html() {
        let payload = MailgunPayload {
            body_plain: Some("plain".into()),
            body_html: Some("<p>html</p>".into()),
            ..Default::default()
        };
        assert_eq!(payload.body(), "<p>html</p>");

        let payload = MailgunPayload {
            body_plain: Some("plain".into()),
            body_html: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(payload.body(), "plain");
        assert_eq!(MailgunPayload::default().body(), "");
    }

    #[test]
    fn test_missing_signature_fields() {
        let payload = MailgunPayload {
            timestamp: Some("1".into()),
            ..Default::default()
        };
        assert!(matches!(
            payload.signature(),
            Err(WebhookError::SignatureVerificationFailed("Missing token"))
        ));
    }
}
