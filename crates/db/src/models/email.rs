use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One received message in a mailbox's inbox. Ids grow monotonically, so
/// clients poll with the last id they saw.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessage {
    pub id: i64,
    #[serde(skip)]
    pub mailbox_id: Uuid,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

pub struct NewInboxMessage<'a> {
    pub sender: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}
