use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::candidate::{Candidate, CandidateCore, NewCandidate},
    mongodb::Id,
};

/// A candidate to add to an election.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub party: String,
    #[serde(default)]
    pub bio: String,
}

impl CandidateSpec {
    pub fn into_candidate(self, election_id: Id, now: DateTime<Utc>) -> NewCandidate {
        CandidateCore {
            election_id,
            name: self.name,
            party: self.party,
            bio: self.bio,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub name: String,
    pub party: String,
    pub bio: String,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.candidate.election_id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            bio: candidate.candidate.bio,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example(name: &str) -> Self {
            Self {
                name: name.to_string(),
                party: "Dumbledore's Army".to_string(),
                bio: String::new(),
            }
        }
    }
}
