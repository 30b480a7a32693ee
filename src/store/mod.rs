//! The persistence collaborator.
//!
//! Everything the application reads or writes goes through the [`Store`]
//! traits, so the engine never depends on a particular database. The store is
//! the authoritative enforcer of uniqueness and of the rules protecting cast
//! votes: pre-checks made elsewhere are conveniences, and a violated
//! constraint always surfaces here as [`StoreError::Conflict`].

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use mongodb::{
    bson::document::ValueAccessError,
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR},
};
use thiserror::Error;

use crate::model::{
    db::{
        admin::{Admin, NewAdmin},
        audit::{AuditEntry, NewAuditEntry},
        candidate::{Candidate, NewCandidate},
        election::{Election, ElectionCore, NewElection},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter, VoterDetails},
    },
    mongodb::Id,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// A store shared between all requests.
pub type SharedStore = Arc<dyn Store>;

/// Constraints the store enforces at write time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// A voter casts at most one vote per election.
    OneVotePerElection,
    /// Candidate names are unique within an election.
    UniqueCandidateName,
    /// Usernames are unique within a user type.
    UniqueUsername,
    /// Voter identifiers are unique.
    UniqueVoterId,
    /// A vote's candidate must exist and belong to the vote's election.
    CandidateBelongsToElection,
    /// A candidate who has received votes cannot be removed.
    VotedCandidateKept,
    /// An election with votes cannot be deleted.
    VotedElectionKept,
    /// An election's start and end times are fixed once it has votes.
    VotingWindowFixed,
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let description = match self {
            Self::OneVotePerElection => "voter has already voted in this election",
            Self::UniqueCandidateName => "candidate name already used in this election",
            Self::UniqueUsername => "username already in use",
            Self::UniqueVoterId => "voter ID already registered",
            Self::CandidateBelongsToElection => "candidate does not belong to this election",
            Self::VotedCandidateKept => "candidate has already received votes",
            Self::VotedElectionKept => "election already has votes",
            Self::VotingWindowFixed => "voting window cannot change once votes have been cast",
        };
        write!(f, "{description}")
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Constraint violated: {0}")]
    Conflict(Constraint),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Malformed stored data: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Could retrying the same operation succeed?
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(e) => e.contains_label(TRANSIENT_TRANSACTION_ERROR),
            Self::Conflict(_) | Self::Corrupt(_) => false,
        }
    }
}

impl From<ValueAccessError> for StoreError {
    fn from(err: ValueAccessError) -> Self {
        Self::Corrupt(err.to_string())
    }
}

#[rocket::async_trait]
pub trait AdminStore: Send + Sync {
    /// Fails with [`Constraint::UniqueUsername`] if the name is taken.
    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin>;

    async fn admin_by_id(&self, id: Id) -> StoreResult<Option<Admin>>;

    async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>>;

    /// All admins, ordered by username.
    async fn admins(&self) -> StoreResult<Vec<Admin>>;

    /// Returns whether an admin was deleted.
    async fn delete_admin(&self, username: &str) -> StoreResult<bool>;
}

#[rocket::async_trait]
pub trait VoterStore: Send + Sync {
    /// Fails with [`Constraint::UniqueUsername`] or [`Constraint::UniqueVoterId`].
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter>;

    async fn voter_by_id(&self, id: Id) -> StoreResult<Option<Voter>>;

    async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>>;

    /// Voters, most recently registered first.
    async fn voters(&self, limit: Option<usize>) -> StoreResult<Vec<Voter>>;

    async fn count_voters(&self) -> StoreResult<u64>;

    /// Returns the updated voter, or `None` if there is no such voter.
    async fn set_voter_eligibility(
        &self,
        id: Id,
        is_eligible: bool,
    ) -> StoreResult<Option<Voter>>;

    /// Overwrite the details a voter may edit themselves. Returns the updated
    /// voter, or `None` if there is no such voter.
    async fn update_voter_details(
        &self,
        id: Id,
        details: VoterDetails,
    ) -> StoreResult<Option<Voter>>;
}

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    async fn insert_election(&self, election: NewElection) -> StoreResult<Election>;

    async fn election_by_id(&self, id: Id) -> StoreResult<Option<Election>>;

    /// All elections, most recently created first.
    async fn elections(&self) -> StoreResult<Vec<Election>>;

    /// Returns the updated election, or `None` if there is no such election.
    /// Fails with [`Constraint::VotingWindowFixed`] if the start or end time
    /// changes while the election has votes.
    async fn replace_election(
        &self,
        id: Id,
        election: ElectionCore,
    ) -> StoreResult<Option<Election>>;

    /// Delete an election together with its candidates.
    /// Returns whether the election existed. Fails with
    /// [`Constraint::VotedElectionKept`] if it has votes.
    async fn delete_election(&self, id: Id) -> StoreResult<bool>;

    /// Fails with [`Constraint::UniqueCandidateName`] if the election
    /// already has a candidate of that name.
    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate>;

    async fn candidate_by_id(&self, id: Id) -> StoreResult<Option<Candidate>>;

    /// The election's candidates, ordered by name.
    async fn candidates_for(&self, election_id: Id) -> StoreResult<Vec<Candidate>>;

    /// Returns whether the candidate existed. Fails with
    /// [`Constraint::VotedCandidateKept`] if they have votes.
    async fn delete_candidate(&self, id: Id) -> StoreResult<bool>;
}

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    async fn vote_by_voter(&self, voter_id: Id, election_id: Id) -> StoreResult<Option<Vote>>;

    /// Atomically record a vote. Nothing is written unless this succeeds.
    ///
    /// Fails with [`Constraint::OneVotePerElection`] if the voter already has
    /// a vote in the election, however many writers race, and with
    /// [`Constraint::CandidateBelongsToElection`] if the candidate is gone or
    /// belongs elsewhere.
    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote>;

    /// Number of votes per candidate. Candidates without votes are absent.
    async fn vote_counts(&self, election_id: Id) -> StoreResult<HashMap<Id, u64>>;

    /// Every vote in the election, oldest first.
    async fn election_votes(&self, election_id: Id) -> StoreResult<Vec<Vote>>;

    async fn count_election_votes(&self, election_id: Id) -> StoreResult<u64>;

    /// Every vote the voter has cast, newest first.
    async fn votes_by_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>>;

    async fn count_all_votes(&self) -> StoreResult<u64>;

    /// Most recent votes across all elections, newest first.
    async fn recent_votes(&self, limit: usize) -> StoreResult<Vec<Vote>>;
}

#[rocket::async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry>;

    /// Most recent entries, newest first.
    async fn recent_audit(&self, limit: usize) -> StoreResult<Vec<AuditEntry>>;
}

/// Everything the application needs from persistence.
pub trait Store: AdminStore + VoterStore + ElectionStore + VoteStore + AuditStore {}

impl<T> Store for T where T: AdminStore + VoterStore + ElectionStore + VoteStore + AuditStore {}
