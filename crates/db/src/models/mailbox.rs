use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, FromRow)]
pub struct Mailbox {
    pub id: Uuid,
    pub address: String,
    pub owner_id: Option<Uuid>,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    /// `None` for permanent (premium) mailboxes.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Mailbox {
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// Whole days left before expiry, rounded up and never negative.
    /// `None` for permanent mailboxes.
    pub fn remaining_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|expires_at| {
            let millis = (expires_at - now).num_milliseconds();
            if millis <= 0 {
                0
            } else {
                (millis + DAY_MILLIS - 1) / DAY_MILLIS
            }
        })
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == Some(user_id)
    }
}

pub struct NewMailbox {
    pub address: String,
    pub owner_id: Option<Uuid>,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

// DTOs for API responses

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryMailboxResponse {
    pub id: Uuid,
    pub email: String,
    pub api_key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermanentMailboxResponse {
    pub id: Uuid,
    pub email: String,
    pub api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationResponse {
    pub expires_at: Option<DateTime<Utc>>,
    pub is_permanent: bool,
    pub remaining_days: Option<i64>,
}

// DTOs for API requests

/// Query string shared by the inbox, expiration and message views.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxQuery {
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub last_email_id: Option<i64>,
    #[serde(default)]
    pub highlight: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub email_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMailboxRequest {
    pub id: Option<Uuid>,
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mailbox(expires_at: Option<DateTime<Utc>>) -> Mailbox {
        Mailbox {
            id: Uuid::new_v4(),
            address: "abc@mailshuffle.xyz".to_string(),
            owner_id: None,
            api_key: "k".to_string(),
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_remaining_days_rounds_up() {
        let now = Utc::now();
        let m = mailbox(Some(now + Duration::days(6) + Duration::hours(1)));
        assert_eq!(m.remaining_days(now), Some(7));
    }

    #[test]
    fn test_remaining_days_floors_at_zero() {
        let now = Utc::now();
        let m = mailbox(Some(now - Duration::hours(3)));
        assert_eq!(m.remaining_days(now), Some(0));
        assert!(m.is_expired_at(now));
    }

    #[test]
    fn test_permanent_mailbox() {
        let m = mailbox(None);
        assert!(m.is_permanent());
        assert!(!m.is_expired_at(Utc::now()));
        assert_eq!(m.remaining_days(Utc::now()), None);
    }
}
