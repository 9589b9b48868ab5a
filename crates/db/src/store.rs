//! Persistence ports used by the HTTP layer.
//!
//! Uniqueness (addresses, user emails/usernames, one permanent mailbox per
//! user) is enforced by the store and surfaced as [`ServiceError`]
//! variants, never checked-then-inserted by callers.

use crate::models::email::{InboxMessage, NewInboxMessage};
use crate::models::mailbox::{Mailbox, NewMailbox};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::error::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait MailboxStore: Send + Sync {
    /// Inserts a mailbox. Fails with [`ServiceError::AddressTaken`] when the
    /// address collides ignoring case, or [`ServiceError::PermanentExists`]
    /// when the owner already has a permanent mailbox.
    async fn create_mailbox(&self, mailbox: NewMailbox) -> Result<Mailbox, ServiceError>;

    /// Case-insensitive lookup. Expired mailboxes are still returned.
    async fn find_mailbox_by_address(&self, address: &str)
        -> Result<Option<Mailbox>, ServiceError>;

    async fn find_mailbox_by_id(&self, id: Uuid) -> Result<Option<Mailbox>, ServiceError>;

    async fn find_permanent_mailbox(&self, owner_id: Uuid)
        -> Result<Option<Mailbox>, ServiceError>;

    /// Deletes the mailbox and its inbox. Returns false if nothing matched.
    async fn delete_mailbox(&self, id: Uuid) -> Result<bool, ServiceError>;

    /// Deletes every mailbox whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError>;

    async fn append_message(
        &self,
        mailbox_id: Uuid,
        message: &NewInboxMessage<'_>,
    ) -> Result<InboxMessage, ServiceError>;

    /// Messages ordered by id; only those after `after_id` when given.
    async fn list_messages(
        &self,
        mailbox_id: Uuid,
        after_id: Option<i64>,
    ) -> Result<Vec<InboxMessage>, ServiceError>;

    async fn find_message(
        &self,
        mailbox_id: Uuid,
        message_id: i64,
    ) -> Result<Option<InboxMessage>, ServiceError>;

    async fn delete_message(&self, mailbox_id: Uuid, message_id: i64)
        -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`ServiceError::DuplicateUser`] if the email or username
    /// is taken, ignoring case.
    async fn create_user(&self, user: NewUser) -> Result<User, ServiceError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError>;

    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;

    /// Returns `None` when the user does not exist.
    async fn update_user(&self, id: Uuid, changes: UserChanges)
        -> Result<Option<User>, ServiceError>;

    /// Deletes the user together with their mailboxes.
    async fn delete_user(&self, id: Uuid) -> Result<bool, ServiceError>;
}

/// Everything the service needs from storage.
pub trait Store: MailboxStore + UserStore {}

impl<T: MailboxStore + UserStore> Store for T {}
