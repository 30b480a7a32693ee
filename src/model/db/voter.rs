use std::ops::{Deref, DerefMut};

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Voters are eligible unless an admin says otherwise.
fn default_eligibility() -> bool {
    true
}

/// Core voter user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Login name, unique across voters.
    pub username: String,
    /// Argon2-encoded password hash.
    pub password_hash: String,
    /// Externally issued voter identification, unique across voters.
    pub voter_id: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Whether votes from this voter may be admitted.
    #[serde(default = "default_eligibility")]
    pub is_eligible: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
}

impl VoterCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// The parts of a voter's record they can edit themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterDetails {
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::common::hash_password;

    impl VoterCore {
        /// An eligible adult voter whose password is `coordinator`.
        pub fn example() -> Self {
            Self {
                username: "hermione".to_string(),
                password_hash: hash_password("coordinator").unwrap(),
                voter_id: "V-0001".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 9, 19).unwrap(),
                phone_number: None,
                is_eligible: true,
                registered_at: Utc::now(),
            }
        }

        pub fn example_ineligible() -> Self {
            Self {
                username: "ron".to_string(),
                voter_id: "V-0002".to_string(),
                is_eligible: false,
                ..Self::example()
            }
        }
    }
}
