use bmessage_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing or invalid credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// The named entity (conversation, message, group, invite link, user)
    /// does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Authenticated, but the role or ownership check failed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// A durable write failed. In-memory state was left unchanged.
    #[error("Persistence error: {0}")]
    Persist(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(what: &str) -> Self {
        Self::NotFound(what.to_string())
    }

    pub(crate) fn forbidden(reason: &str) -> Self {
        Self::Forbidden(reason.to_string())
    }

    pub(crate) fn validation(reason: &str) -> Self {
        Self::Validation(reason.to_string())
    }

    pub(crate) fn poisoned() -> Self {
        Self::Internal("state lock poisoned".to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
