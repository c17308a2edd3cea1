//! Domain error types.

use store::StoreError;
use thiserror::Error;

/// Stable error categories that callers map to their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing caller-supplied input. Never worth retrying.
    InvalidInput,
    /// A referenced user or product does not exist.
    NotFound,
    /// Insufficient stock, a lost race, or a duplicate registration.
    Conflict,
    /// Storage or infrastructure failure.
    Internal,
}

impl ErrorKind {
    /// Returns a short label, suitable for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A caller-supplied field is missing or malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    /// The request conflicts with the current state of the store.
    #[error("{0}")]
    Conflict(String),

    /// Hashing a credential failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Internal(StoreError),
}

impl DomainError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidInput(_) => ErrorKind::InvalidInput,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::PasswordHash(_) | DomainError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::Conflict(message) => DomainError::Conflict(message),
            other => DomainError::Internal(other),
        }
    }
}
