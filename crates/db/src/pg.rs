use crate::models::email::{InboxMessage, NewInboxMessage};
use crate::models::mailbox::{Mailbox, NewMailbox};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::error::ServiceError;
use crate::store::{MailboxStore, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const UNIQUE_VIOLATION_CODE: &str = "23505";
const PERMANENT_OWNER_INDEX: &str = "mailboxes_owner_permanent_key";

const MAILBOX_COLUMNS: &str = "id, address, owner_id, api_key, created_at, expires_at";
const MESSAGE_COLUMNS: &str = "id, mailbox_id, sender, subject, body, received_at";
const USER_COLUMNS: &str =
    "id, full_name, username, email, password_hash, api_key, is_admin, created_at";

/// Postgres-backed store. Schema lives in `migrations/` and is applied with
/// [`crate::MIGRATOR`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Returns the violated constraint name if `e` is a unique constraint
/// violation.
fn unique_violation(e: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = e {
        // By using `db_err.code()`, we can check the error code without
        // needing to downcast to a specific database error type like `PgError`.
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION_CODE) {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}

#[async_trait]
impl MailboxStore for PgStore {
    async fn create_mailbox(&self, mailbox: NewMailbox) -> Result<Mailbox, ServiceError> {
        let sql = format!(
            "INSERT INTO mailboxes (id, address, owner_id, api_key, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {MAILBOX_COLUMNS}"
        );
        let record = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(Uuid::new_v4())
            .bind(&mailbox.address)
            .bind(mailbox.owner_id)
            .bind(&mailbox.api_key)
            .bind(mailbox.created_at)
            .bind(mailbox.expires_at)
            .fetch_one(&self.pool)
            .await;

        match record {
            Ok(record) => Ok(record),
            Err(e) => match unique_violation(&e) {
                Some(constraint) if constraint == PERMANENT_OWNER_INDEX => {
                    Err(ServiceError::PermanentExists)
                }
                Some(_) => Err(ServiceError::AddressTaken),
                None => Err(ServiceError::DatabaseError(e)),
            },
        }
    }

    async fn find_mailbox_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Mailbox>, ServiceError> {
        let sql = format!("SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE LOWER(address) = LOWER($1)");
        Ok(sqlx::query_as::<_, Mailbox>(&sql)
            .bind(address)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_mailbox_by_id(&self, id: Uuid) -> Result<Option<Mailbox>, ServiceError> {
        let sql = format!("SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE id = $1");
        Ok(sqlx::query_as::<_, Mailbox>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_permanent_mailbox(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<Mailbox>, ServiceError> {
        let sql = format!(
            "SELECT {MAILBOX_COLUMNS} FROM mailboxes WHERE owner_id = $1 AND expires_at IS NULL"
        );
        Ok(sqlx::query_as::<_, Mailbox>(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_mailbox(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM mailboxes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Thanks to ON DELETE CASCADE on `inbox_messages.mailbox_id`, deleting
    // a mailbox removes its messages.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "DELETE FROM mailboxes WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn append_message(
        &self,
        mailbox_id: Uuid,
        message: &NewInboxMessage<'_>,
    ) -> Result<InboxMessage, ServiceError> {
        let sql = format!(
            "INSERT INTO inbox_messages (mailbox_id, sender, subject, body)
             VALUES ($1, $2, $3, $4)
             RETURNING {MESSAGE_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, InboxMessage>(&sql)
            .bind(mailbox_id)
            .bind(message.sender)
            .bind(message.subject)
            .bind(message.body)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_messages(
        &self,
        mailbox_id: Uuid,
        after_id: Option<i64>,
    ) -> Result<Vec<InboxMessage>, ServiceError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM inbox_messages
             WHERE mailbox_id = $1 AND ($2::BIGINT IS NULL OR id > $2)
             ORDER BY id"
        );
        Ok(sqlx::query_as::<_, InboxMessage>(&sql)
            .bind(mailbox_id)
            .bind(after_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_message(
        &self,
        mailbox_id: Uuid,
        message_id: i64,
    ) -> Result<Option<InboxMessage>, ServiceError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM inbox_messages WHERE mailbox_id = $1 AND id = $2"
        );
        Ok(sqlx::query_as::<_, InboxMessage>(&sql)
            .bind(mailbox_id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_message(
        &self,
        mailbox_id: Uuid,
        message_id: i64,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM inbox_messages WHERE mailbox_id = $1 AND id = $2")
            .bind(mailbox_id)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, ServiceError> {
        let sql = format!(
            "INSERT INTO users (id, full_name, username, email, password_hash, api_key, is_admin)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.full_name)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.api_key)
            .bind(user.is_admin)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => ServiceError::DuplicateUser,
                None => ServiceError::DatabaseError(e),
            })
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, ServiceError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE api_key = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, ServiceError> {
        let sql = format!(
            "UPDATE users SET
                full_name = COALESCE($2, full_name),
                username = COALESCE($3, username),
                email = COALESCE($4, email),
                password_hash = COALESCE($5, password_hash)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.full_name)
            .bind(changes.username)
            .bind(changes.email)
            .bind(changes.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => ServiceError::DuplicateUser,
                None => ServiceError::DatabaseError(e),
            })
    }

    // Owned mailboxes go with the user through ON DELETE CASCADE.
    async fn delete_user(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
