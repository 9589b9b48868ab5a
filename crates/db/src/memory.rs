//! In-process [`Store`](crate::Store) mirroring the Postgres constraints.

use crate::models::email::{InboxMessage, NewInboxMessage};
use crate::models::mailbox::{Mailbox, NewMailbox};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::error::ServiceError;
use crate::store::{MailboxStore, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    mailboxes: HashMap<Uuid, Mailbox>,
    messages: BTreeMap<i64, InboxMessage>,
    last_message_id: i64,
    users: HashMap<Uuid, User>,
}

impl Inner {
    fn remove_mailbox(&mut self, id: Uuid) -> bool {
        let removed = self.mailboxes.remove(&id).is_some();
        if removed {
            self.messages.retain(|_, m| m.mailbox_id != id);
        }
        removed
    }

    fn user_conflicts(&self, except: Option<Uuid>, email: &str, username: &str) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except
                && (u.email.eq_ignore_ascii_case(email) || u.username.eq_ignore_ascii_case(username))
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailboxStore for MemoryStore {
    async fn create_mailbox(&self, mailbox: NewMailbox) -> Result<Mailbox, ServiceError> {
        let mut inner = self.inner.write().await;
        if inner
            .mailboxes
            .values()
            .any(|m| m.address.eq_ignore_ascii_case(&mailbox.address))
        {
            return Err(ServiceError::AddressTaken);
        }
        if let (Some(owner_id), None) = (mailbox.owner_id, mailbox.expires_at) {
            if inner
                .mailboxes
                .values()
                .any(|m| m.is_owned_by(owner_id) && m.is_permanent())
            {
                return Err(ServiceError::PermanentExists);
            }
        }

        let record = Mailbox {
            id: Uuid::new_v4(),
            address: mailbox.address,
            owner_id: mailbox.owner_id,
            api_key: mailbox.api_key,
            created_at: mailbox.created_at,
            expires_at: mailbox.expires_at,
        };
        inner.mailboxes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_mailbox_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Mailbox>, ServiceError> {
        let inner = self.inner.read().await;
        Ok(inner
            .mailboxes
            .values()
            .find(|m| m.address.eq_ignore_ascii_case(address))
            .cloned())
    }

    async fn find_mailbox_by_id(&self, id: Uuid) -> Result<Option<Mailbox>, ServiceError> {
        Ok(self.inner.read().await.mailboxes.get(&id).cloned())
    }

    async fn find_permanent_mailbox(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<Mailbox>, ServiceError> {
        let inner = self.inner.read().await;
        Ok(inner
            .mailboxes
            .values()
            .find(|m| m.is_owned_by(owner_id) && m.is_permanent())
            .cloned())
    }

    async fn delete_mailbox(&self, id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.inner.write().await.remove_mailbox(id))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let mut inner = self.inner.write().await;
        let expired: Vec<Uuid> = inner
            .mailboxes
            .values()
            .filter(|m| m.is_expired_at(now))
            .map(|m| m.id)
            .collect();
        for id in &expired {
            inner.remove_mailbox(*id);
        }
        Ok(expired.len() as u64)
    }

    async fn append_message(
        &self,
        mailbox_id: Uuid,
        message: &NewInboxMessage<'_>,
    ) -> Result<InboxMessage, ServiceError> {
        let mut inner = self.inner.write().await;
        inner.last_message_id += 1;
        let record = InboxMessage {
            id: inner.last_message_id,
            mailbox_id,
            sender: message.sender.to_string(),
            subject: message.subject.to_string(),
            body: message.body.to_string(),
            received_at: Utc::now(),
        };
        inner.messages.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_messages(
        &self,
        mailbox_id: Uuid,
        after_id: Option<i64>,
    ) -> Result<Vec<InboxMessage>, ServiceError> {
        let inner = self.inner.read().await;
        let start = after_id.map_or(i64::MIN, |id| id.saturating_add(1));
        Ok(inner
            .messages
            .range(start..)
            .map(|(_, m)| m)
            .filter(|m| m.mailbox_id == mailbox_id)
            .cloned()
            .collect())
    }

    async fn find_message(
        &self,
        mailbox_id: Uuid,
        message_id: i64,
    ) -> Result<Option<InboxMessage>, ServiceError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .get(&message_id)
            .filter(|m| m.mailbox_id == mailbox_id)
            .cloned())
    }

    async fn delete_message(
        &self,
        mailbox_id: Uuid,
        message_id: i64,
    ) -> Result<bool, ServiceError> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .messages
            .get(&message_id)
            .is_some_and(|m| m.mailbox_id == mailbox_id);
        if owned {
            inner.messages.remove(&message_id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let mut inner = self.inner.write().await;
        if inner.user_conflicts(None, &user.email, &user.username) {
            return Err(ServiceError::DuplicateUser);
        }
        let record = User {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            api_key: user.api_key,
            is_admin: user.is_admin,
            created_at: Utc::now(),
        };
        inner.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.api_key == api_key).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, ServiceError> {
        let mut inner = self.inner.write().await;
        let Some(current) = inner.users.get(&id).cloned() else {
            return Ok(None);
        };

        let email = changes.email.unwrap_or(current.email);
        let username = changes.username.unwrap_or(current.username);
        if inner.user_conflicts(Some(id), &email, &username) {
            return Err(ServiceError::DuplicateUser);
        }

        let updated = User {
            full_name: changes.full_name.unwrap_or(current.full_name),
            username,
            email,
            password_hash: changes.password_hash.unwrap_or(current.password_hash),
            ..current
        };
        inner.users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, ServiceError> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: Vec<Uuid> = inner
            .mailboxes
            .values()
            .filter(|m| m.is_owned_by(id))
            .map(|m| m.id)
            .collect();
        for mailbox_id in owned {
            inner.remove_mailbox(mailbox_id);
        }
        Ok(true)
    }
}
