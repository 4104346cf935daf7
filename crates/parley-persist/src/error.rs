use thiserror::Error;

/// Conversation store failures
#[derive(Error, Debug)]
pub enum PersistError {
    /// Server unreachable at startup; not retried
    #[error("Cannot reach MongoDB: {0}")]
    Connection(String),

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB operation failed: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Conversation store error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;
