use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    common::{hash_password, MIN_PASSWORD_LENGTH},
    db::admin::{Admin, NewAdmin},
};

/// Raw credentials, received from a user. These are never stored directly,
/// since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Why credentials cannot be used for a new account.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Username must not be empty")]
    EmptyUsername,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    ShortPassword,
    #[error("Failed to hash password: {0}")]
    Hash(#[from] argon2::Error),
}

/// Check a new account's username and password are acceptable.
pub fn check_credentials(username: &str, password: &str) -> Result<(), CredentialsError> {
    if username.trim().is_empty() {
        return Err(CredentialsError::EmptyUsername);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialsError::ShortPassword);
    }
    Ok(())
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = CredentialsError;

    /// Convert [`AdminCredentials`] to a new [`Admin`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        check_credentials(&cred.username, &cred.password)?;
        Ok(Self {
            password_hash: hash_password(&cred.password)?,
            username: cred.username,
        })
    }
}

/// What other admins may see of an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDescription {
    pub username: String,
}

impl From<Admin> for AdminDescription {
    fn from(admin: Admin) -> Self {
        Self {
            username: admin.admin.username,
        }
    }
}
