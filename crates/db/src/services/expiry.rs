use crate::services::error::ServiceError;
use crate::store::MailboxStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Deletes mailboxes whose expiry has passed, along with their inboxes.
pub async fn delete_expired_mailboxes<S>(store: &S) -> Result<u64, ServiceError>
where
    S: MailboxStore + ?Sized,
{
    let deleted = store.delete_expired(Utc::now()).await?;
    if deleted > 0 {
        info!("Cleanup: deleted {} expired mailboxes", deleted);
    }
    Ok(deleted)
}

/// Runs [`delete_expired_mailboxes`] every `every` until the task is dropped.
/// Periods shorter than a second are raised to one second.
pub async fn run_expiry_sweeper<S>(store: Arc<S>, every: Duration)
where
    S: MailboxStore + ?Sized,
{
    let mut ticker = tokio::time::interval(every.max(MIN_SWEEP_INTERVAL));
    loop {
        ticker.tick().await;
        if let Err(e) = delete_expired_mailboxes(store.as_ref()).await {
            error!("Cleanup failed: {}", e);
        }
    }
}
