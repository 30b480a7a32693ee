use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::WindowState, db::vote::Vote};

/// A voter's choice.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct VoteRequest {
    pub candidate_id: ApiId,
}

/// Confirmation of a recorded vote, shown only to the voter who cast it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            candidate_id: vote.candidate_id.into(),
            cast_at: vote.cast_at,
        }
    }
}

/// A voter's standing in one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterBallotStatus {
    pub election_id: ApiId,
    pub state: WindowState,
    /// Whether a vote would be admitted right now.
    pub can_vote: bool,
    /// The voter's vote, if they have cast one.
    pub vote: Option<VoteReceipt>,
}
