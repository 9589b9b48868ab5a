//! HTTP surface of the disposable mail service: user accounts, mailbox
//! management, message views and the Mailgun inbound webhook.

pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod extract;
pub mod password;
pub mod router;

pub use crate::config::AppConfig;
pub use crate::core::AppState;
pub use crate::router::build_router;
