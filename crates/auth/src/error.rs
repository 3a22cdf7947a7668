use thiserror::Error;

/// Authentication/authorization failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is pending approval")]
    PendingApproval,

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The identity collaborator failed; the detail is for logs, not callers.
    #[error("identity provider failure: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}
