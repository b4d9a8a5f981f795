//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication and account management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Username empty or too long.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Username already taken.
    #[error("username already exists")]
    UsernameTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Admin accounts are protected from deletion.
    #[error("admin accounts cannot be deleted")]
    CannotDeleteAdmin,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether this error stems from user input rather than a server fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Repository(_) | Self::PasswordHash)
    }
}
