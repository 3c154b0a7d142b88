use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl DatabaseError {
    /// Whether the error means a referenced row does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatabaseError::EntityNotFound(_) | DatabaseError::Connection(sqlx::Error::RowNotFound)
        )
    }
}
