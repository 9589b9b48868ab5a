pub mod error;
pub mod expiry;
pub mod generator;
pub mod mailbox;
