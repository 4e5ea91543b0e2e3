use thiserror::Error;

/// Unified error type for credential store operations that application code can handle
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record exists for the given identifier
    #[error("User record not found")]
    NotFound,

    /// Username uniqueness violation
    #[error("Username '{username}' already exists")]
    DuplicateUsername { username: String },

    /// Catch-all for non-recoverable errors (I/O, serialization)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type alias for store operation results
pub type Result<T> = std::result::Result<T, StoreError>;
