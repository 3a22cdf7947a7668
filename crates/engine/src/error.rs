//! Error taxonomy surfaced to callers of the engine.

use thiserror::Error;

use bazaar_auth::AuthError;
use bazaar_core::DomainError;
use bazaar_infra::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Engine operation error.
///
/// Validation and domain errors carry a description for the caller. `Internal`
/// deliberately carries nothing: the collaborator detail is logged where the
/// failure is converted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unauthenticated or not allowed.
    #[error(transparent)]
    Auth(AuthError),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Quota exceeded, duplicate active subscription, stale state or a lost
    /// commit race after retries.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A business rule rejected the input (bad commission base, unknown tier).
    #[error("domain rule violated: {0}")]
    Domain(String),

    #[error("internal error")]
    Internal,
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Auth(AuthError::forbidden(msg))
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::Domain(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized(msg) => ServiceError::Auth(AuthError::Forbidden(msg)),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Internal(detail) => {
                tracing::error!(%detail, "identity collaborator failed");
                ServiceError::Internal
            }
            other => ServiceError::Auth(other),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) | StoreError::UniqueViolation(msg) => ServiceError::Conflict(msg),
            StoreError::Backend(detail) => {
                tracing::error!(%detail, "store backend failed");
                ServiceError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_onto_the_taxonomy() {
        assert_eq!(
            ServiceError::from(DomainError::invariant("amount must not be negative")),
            ServiceError::Domain("amount must not be negative".into())
        );
        assert_eq!(
            ServiceError::from(DomainError::unauthorized("account cannot sell")),
            ServiceError::Auth(AuthError::Forbidden("account cannot sell".into()))
        );
        assert!(matches!(
            ServiceError::from(DomainError::invalid_id("UserId: bad")),
            ServiceError::Validation(_)
        ));
    }

    #[test]
    fn collaborator_internals_are_not_leaked() {
        let err = ServiceError::from(StoreError::Backend("disk on fire".into()));
        assert_eq!(err, ServiceError::Internal);
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(
            ServiceError::from(AuthError::Internal("hash parse".into())),
            ServiceError::Internal
        );
    }

    #[test]
    fn store_constraints_surface_as_conflicts() {
        assert!(matches!(
            ServiceError::from(StoreError::UniqueViolation("email taken".into())),
            ServiceError::Conflict(_)
        ));
    }
}
