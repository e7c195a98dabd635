use serde::{Deserialize, Serialize};
pub use thiserror::Error;

pub type PortalResult<T> = Result<T, PortalError>;

#[derive(Debug, Serialize, Deserialize, Error, Clone, PartialEq)]
pub enum PortalError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid claim transition: {0}")]
    InvalidTransition(String),
    #[error("business rule violated: {0}")]
    BusinessRule(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<&str> for PortalError {
    fn from(msg: &str) -> Self {
        PortalError::Validation(msg.to_string())
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(e: serde_json::Error) -> Self {
        PortalError::Serialization(e.to_string())
    }
}

impl From<uuid::Error> for PortalError {
    fn from(e: uuid::Error) -> Self {
        PortalError::Validation(format!("malformed UUID: {}", e))
    }
}

impl PortalError {
    /// True when the error should surface to the client as caller fault
    /// rather than a masked internal failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            PortalError::NotFound(_)
                | PortalError::Validation(_)
                | PortalError::InvalidTransition(_)
                | PortalError::BusinessRule(_)
                | PortalError::Conflict(_)
                | PortalError::Auth(_)
                | PortalError::Forbidden(_)
        )
    }
}
