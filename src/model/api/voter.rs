use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::voter::Voter};

/// A registration request. The password is in plaintext and never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterRegistration {
    pub username: String,
    pub password: String,
    /// Externally issued voter identification.
    pub voter_id: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Voter login details.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterCredentials {
    pub username: String,
    pub password: String,
}

/// What a voter, or an admin, sees of a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterProfile {
    pub id: ApiId,
    pub username: String,
    pub voter_id: String,
    pub date_of_birth: NaiveDate,
    pub phone_number: Option<String>,
    pub is_eligible: bool,
    pub registered_at: DateTime<Utc>,
}

impl From<Voter> for VoterProfile {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            username: voter.voter.username,
            voter_id: voter.voter.voter_id,
            date_of_birth: voter.voter.date_of_birth,
            phone_number: voter.voter.phone_number,
            is_eligible: voter.voter.is_eligible,
            registered_at: voter.voter.registered_at,
        }
    }
}

/// A voter's change to their own details. Omitting the phone number
/// removes it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
}

/// An admin's change to a voter's eligibility.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct EligibilityUpdate {
    pub is_eligible: bool,
}
