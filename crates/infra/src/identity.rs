//! In-memory credential store backed by Argon2 hashes.

use std::collections::HashMap;
use std::sync::RwLock;

use bazaar_accounts::normalize_email;
use bazaar_auth::password::{hash_password, verify_password};
use bazaar_auth::{AuthError, Credentials, Identity};
use bazaar_core::UserId;

#[derive(Debug, Clone)]
struct Enrollment {
    user_id: UserId,
    password_hash: String,
}

/// Credential store for tests/dev. Keys are normalized emails.
#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    by_email: RwLock<HashMap<String, Enrollment>>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Identity for InMemoryIdentity {
    fn enroll(&self, user_id: UserId, credentials: &Credentials) -> Result<(), AuthError> {
        let password_hash = hash_password(&credentials.password).map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            AuthError::Internal("password hashing failed".to_string())
        })?;
        let mut map = self
            .by_email
            .write()
            .map_err(|_| AuthError::Internal("lock poisoned".to_string()))?;
        map.insert(
            normalize_email(&credentials.email),
            Enrollment {
                user_id,
                password_hash,
            },
        );
        Ok(())
    }

    fn verify(&self, credentials: &Credentials) -> Result<UserId, AuthError> {
        let enrollment = {
            let map = self
                .by_email
                .read()
                .map_err(|_| AuthError::Internal("lock poisoned".to_string()))?;
            map.get(&normalize_email(&credentials.email)).cloned()
        };
        let Some(enrollment) = enrollment else {
            return Err(AuthError::InvalidCredentials);
        };
        match verify_password(&credentials.password, &enrollment.password_hash) {
            Ok(true) => Ok(enrollment.user_id),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                tracing::error!(error = %e, "stored password hash is unreadable");
                Err(AuthError::Internal("credential check failed".to_string()))
            }
        }
    }

    fn forget(&self, user_id: UserId) {
        if let Ok(mut map) = self.by_email.write() {
            map.retain(|_, e| e.user_id != user_id);
        }
    }
}
