pub mod email;
pub mod mailbox;
pub mod user;
