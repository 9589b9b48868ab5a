pub mod models;
pub mod pg;
pub mod services;
pub mod store;

#[cfg(feature = "memory")]
pub mod memory;

pub use pg::PgStore;
pub use services::error::ServiceError;
pub use store::{MailboxStore, Store, UserStore};

/// Embedded schema migrations for [`PgStore`].
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
