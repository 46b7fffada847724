//! Domain Error Types
//!
//! Business rule failures that don't depend on the backend.

use thiserror::Error;

/// Text returned for every failed permission check
pub const PERMISSION_DENIED_MESSAGE: &str = "Usuário não tem permissão para esta operação";

/// Domain-specific errors
///
/// Permission failures from every service share one variant and one message,
/// so callers never need to match on text.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Caller lacks the access level the operation requires
    #[error("{0}")]
    PermissionDenied(String),

    /// Record absent or not visible
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input rejected before reaching the backend
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Company neither reachable nor fetchable
    #[error("Company unavailable: {0}")]
    CompanyUnavailable(uuid::Uuid),

    /// No signed-in user for a session operation
    #[error("Not signed in")]
    NotSignedIn,
}

impl DomainError {
    pub fn permission_denied() -> Self {
        Self::PermissionDenied(PERMISSION_DENIED_MESSAGE.to_string())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::Validation(_) | Self::NotSignedIn
        )
    }
}
