//! A self-contained record of an election's votes, sufficient to recount it
//! offline. Voter identities are left out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        candidate::CandidateDescription, election::ElectionSummary, id::ApiId,
        tally::TallyReport,
    },
    db::vote::Vote,
};

/// One anonymous ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRecord {
    pub vote_id: ApiId,
    pub candidate_id: ApiId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for BallotRecord {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id.into(),
            candidate_id: vote.candidate_id.into(),
            cast_at: vote.cast_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDump {
    pub election: ElectionSummary,
    pub candidates: Vec<CandidateDescription>,
    /// Every ballot, oldest first.
    pub ballots: Vec<BallotRecord>,
    /// The published results.
    pub report: TallyReport,
}
