//! Identity collaborator contract.

use bazaar_core::UserId;

use crate::AuthError;

/// Login credentials as presented by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Verifies who a caller is. Storage and hashing mechanics live behind it.
pub trait Identity: Send + Sync {
    /// Register credentials for a freshly created account.
    fn enroll(&self, user_id: UserId, credentials: &Credentials) -> Result<(), AuthError>;

    /// Resolve credentials to the account they belong to.
    fn verify(&self, credentials: &Credentials) -> Result<UserId, AuthError>;

    /// Drop any credentials held for an account (used when an account is purged).
    fn forget(&self, user_id: UserId);
}

impl<T> Identity for std::sync::Arc<T>
where
    T: Identity + ?Sized,
{
    fn enroll(&self, user_id: UserId, credentials: &Credentials) -> Result<(), AuthError> {
        (**self).enroll(user_id, credentials)
    }

    fn verify(&self, credentials: &Credentials) -> Result<UserId, AuthError> {
        (**self).verify(credentials)
    }

    fn forget(&self, user_id: UserId) {
        (**self).forget(user_id)
    }
}
