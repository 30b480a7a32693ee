//! Types and helpers shared between the DB and API representations.

mod audit;
mod window;

pub use audit::AuditAction;
pub use window::WindowState;

use chrono::{Datelike, NaiveDate};
use rand::Rng;

/// Voters must be at least this old when they register.
pub const MINIMUM_VOTING_AGE: u32 = 18;

/// Shortest password we accept for any account.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Age in whole years on `date` of someone born on `date_of_birth`.
/// Dates before the birth date give zero.
pub fn age_on(date_of_birth: NaiveDate, date: NaiveDate) -> u32 {
    let mut age = date.year() - date_of_birth.year();
    if (date.month(), date.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    u32::try_from(age).unwrap_or(0)
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
}
