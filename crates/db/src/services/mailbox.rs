use crate::models::mailbox::{Mailbox, NewMailbox};
use crate::services::error::ServiceError;
use crate::services::generator::{generate_api_key, generate_email_address};
use crate::store::MailboxStore;
use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

const MAX_RETRIES: usize = 3;

/// Creates an anonymous mailbox that expires after `ttl`.
pub async fn create_temporary_mailbox<S>(
    store: &S,
    domain: &str,
    ttl: Duration,
) -> Result<Mailbox, ServiceError>
where
    S: MailboxStore + ?Sized,
{
    let mailbox = insert_with_retry(store, domain, None, Some(ttl)).await?;
    info!(address = %mailbox.address, "Created temporary mailbox");
    Ok(mailbox)
}

/// Creates the single permanent mailbox of `owner_id`.
/// Fails with [`ServiceError::PermanentExists`] if the user already has one.
pub async fn create_permanent_mailbox<S>(
    store: &S,
    domain: &str,
    owner_id: Uuid,
) -> Result<Mailbox, ServiceError>
where
    S: MailboxStore + ?Sized,
{
    if store.find_permanent_mailbox(owner_id).await?.is_some() {
        return Err(ServiceError::PermanentExists);
    }
    let mailbox = insert_with_retry(store, domain, Some(owner_id), None).await?;
    info!(address = %mailbox.address, owner = %owner_id, "Created permanent mailbox");
    Ok(mailbox)
}

/// Generates an address and inserts it, up to `MAX_RETRIES` times.
/// A collision with an existing address (the store's unique index)
/// triggers a fresh address; any other error stops immediately.
async fn insert_with_retry<S>(
    store: &S,
    domain: &str,
    owner_id: Option<Uuid>,
    ttl: Option<Duration>,
) -> Result<Mailbox, ServiceError>
where
    S: MailboxStore + ?Sized,
{
    for _ in 0..MAX_RETRIES {
        // Fresh address and timestamps on every attempt.
        let created_at = Utc::now();
        let new_mailbox = NewMailbox {
            address: generate_email_address(domain),
            owner_id,
            api_key: generate_api_key(),
            created_at,
            expires_at: ttl.map(|ttl| created_at + ttl),
        };

        match store.create_mailbox(new_mailbox).await {
            Ok(mailbox) => return Ok(mailbox),
            Err(ServiceError::AddressTaken) => {
                debug!("Generated address collided, retrying");
                continue;
            }
            Err(e) => return Err(e),
        }
    }

    Err(ServiceError::FailedToFindUniqueName(MAX_RETRIES))
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_temporary_mailbox_expires() {
        let store = MemoryStore::new();
        let mailbox = create_temporary_mailbox(&store, "mailshuffle.xyz", Duration::days(7))
            .await
            .unwrap();
        assert!(mailbox.address.ends_with("@mailshuffle.xyz"));
        assert!(mailbox.owner_id.is_none());
        let expires_at = mailbox.expires_at.unwrap();
        assert_eq!(expires_at - mailbox.created_at, Duration::days(7));
    }

    #[tokio::test]
    async fn test_second_permanent_mailbox_rejected() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mailbox = create_permanent_mailbox(&store, "mailshuffle.xyz", owner).await.unwrap();
        assert!(mailbox.is_permanent());
        assert!(matches!(
            create_permanent_mailbox(&store, "mailshuffle.xyz", owner).await,
            Err(ServiceError::PermanentExists)
        ));
    }
}
