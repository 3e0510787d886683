use crate::patch::PatchError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrudError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Hook failed: {0}")]
    Hook(String),
}

pub type Result<T> = std::result::Result<T, CrudError>;

impl CrudError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Creates a not-found error with entity context.
    pub fn not_found(entity: &str, key: impl fmt::Display) -> Self {
        Self::DomainNotFound(format!("{entity} not found: {key}"))
    }

    /// Stable machine-readable code for transport adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::DomainNotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Persistence(_) => "persistence",
            Self::Hook(_) => "hook",
        }
    }

    /// True for the caller-facing kinds: bad request, not found and validation.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest(_) | Self::DomainNotFound(_) | Self::Validation(_)
        )
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(err: serde_json::Error) -> Self {
        CrudError::BadRequest(err.to_string())
    }
}

impl From<PatchError> for CrudError {
    fn from(err: PatchError) -> Self {
        CrudError::BadRequest(err.to_string())
    }
}
