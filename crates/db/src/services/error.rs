use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Email address is already taken.")]
    AddressTaken,

    #[error("Email or username is already in use.")]
    DuplicateUser,

    #[error("User already owns a permanent address.")]
    PermanentExists,

    #[error("Failed to generate a unique email after {0} attempts.")]
    FailedToFindUniqueName(usize),
}
