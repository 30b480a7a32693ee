use std::net::IpAddr;

use chrono::{DateTime, Utc};
use log::{debug, info};
use thiserror::Error;

use crate::model::{
    common::{AuditAction, WindowState},
    db::{
        candidate::Candidate,
        election::Election,
        vote::{NewVote, Vote},
        voter::Voter,
    },
    mongodb::Id,
};
use crate::store::{AuditStore, Constraint, StoreError, VoteStore};

use super::{audit, window::classify};

/// Reasons a vote is not admitted. No vote is written in any of these cases.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Candidate {candidate} does not stand in election {election}")]
    CandidateMismatch { candidate: Id, election: Id },
    #[error("Election is not open for voting: {0:?}")]
    ElectionNotOpen(WindowState),
    #[error("Voter is not eligible to vote")]
    VoterIneligible,
    #[error("Voter has already voted in this election")]
    DuplicateVote,
    /// The store failed for some other reason. Retrying with the same inputs
    /// is safe: it either succeeds or reports [`Self::DuplicateVote`].
    #[error(transparent)]
    Store(StoreError),
}

impl AdmissionError {
    /// A short name for this kind of rejection.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CandidateMismatch { .. } => "CandidateMismatch",
            Self::ElectionNotOpen(_) => "ElectionNotOpen",
            Self::VoterIneligible => "VoterIneligible",
            Self::DuplicateVote => "DuplicateVote",
            Self::Store(_) => "InternalError",
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(Constraint::OneVotePerElection) => Self::DuplicateVote,
            err => Self::Store(err),
        }
    }
}

/// Validate and durably record a vote by `voter` for `candidate` in `election`.
///
/// Checks run in a fixed order and the first failure is reported. The check
/// for an existing vote is only a shortcut: the store's (voter, election)
/// constraint decides, so racing calls for one voter admit at most one vote.
pub async fn admit_vote<S>(
    store: &S,
    voter: &Voter,
    election: &Election,
    candidate: &Candidate,
    now: DateTime<Utc>,
    address: Option<IpAddr>,
) -> Result<Vote, AdmissionError>
where
    S: VoteStore + AuditStore + ?Sized,
{
    if candidate.election_id != election.id {
        return Err(AdmissionError::CandidateMismatch {
            candidate: candidate.id,
            election: election.id,
        });
    }

    let state = classify(election, now);
    if state != WindowState::Ongoing {
        return Err(AdmissionError::ElectionNotOpen(state));
    }

    if !voter.is_eligible {
        return Err(AdmissionError::VoterIneligible);
    }

    if store.vote_by_voter(voter.id, election.id).await?.is_some() {
        return Err(AdmissionError::DuplicateVote);
    }

    let vote = NewVote {
        voter_id: voter.id,
        candidate_id: candidate.id,
        election_id: election.id,
        cast_at: now,
        address,
    };
    let vote = match store.insert_vote(vote).await {
        Ok(vote) => vote,
        // The candidate was deleted after we loaded it.
        Err(StoreError::Conflict(Constraint::CandidateBelongsToElection)) => {
            return Err(AdmissionError::CandidateMismatch {
                candidate: candidate.id,
                election: election.id,
            });
        }
        Err(e) => {
            debug!("Vote by {} in election {} not stored: {e}", voter.id, election.id);
            return Err(e.into());
        }
    };
    info!("Admitted vote {} in election {}", vote.id, election.id);

    audit::record(
        store,
        Some(voter.id),
        AuditAction::VoteCast,
        format!("Voted in election {}", election.id),
        address,
    )
    .await;

    Ok(vote)
}
