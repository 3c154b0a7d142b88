use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] database::DatabaseError),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl UserError {
    /// Errors that should be answered with 401 rather than a server failure
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            UserError::InvalidCredentials | UserError::UserNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, UserError>;
