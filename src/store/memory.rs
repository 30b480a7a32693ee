//! An in-process store.
//!
//! There is no database here to enforce uniqueness, so every write checks
//! its constraints and commits while holding the one table lock. Two racing
//! inserts for the same key are serialised by that lock and the second one
//! sees the first.

use std::cmp::Reverse;
use std::collections::HashMap;

use log::trace;
use rocket::tokio::sync::RwLock;

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

use super::{
    AdminStore, AuditStore, Constraint, ElectionStore, StoreError, StoreResult, VoteStore,
    VoterStore,
};

#[derive(Default)]
struct Tables {
    admins: HashMap<Id, Admin>,
    voters: HashMap<Id, Voter>,
    elections: HashMap<Id, Election>,
    candidates: HashMap<Id, Candidate>,
    votes: HashMap<Id, Vote>,
    /// Unique index over (voter, election), pointing at the vote.
    ballots_cast: HashMap<(Id, Id), Id>,
    audit: Vec<AuditEntry>,
}

/// A [`super::Store`] held entirely in memory. Contents are lost on shutdown.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl AdminStore for MemoryStore {
    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let mut tables = self.tables.write().await;
        if tables.admins.values().any(|a| a.username == admin.username) {
            return Err(StoreError::Conflict(Constraint::UniqueUsername));
        }
        let admin = Admin {
            id: Id::new(),
            admin,
        };
        tables.admins.insert(admin.id, admin.clone());
        Ok(admin)
    }

    async fn admin_by_id(&self, id: Id) -> StoreResult<Option<Admin>> {
        Ok(self.tables.read().await.admins.get(&id).cloned())
    }

    async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
        let tables = self.tables.read().await;
        Ok(tables
            .admins
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn admins(&self) -> StoreResult<Vec<Admin>> {
        let mut admins: Vec<_> = self.tables.read().await.admins.values().cloned().collect();
        admins.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(admins)
    }

    async fn delete_admin(&self, username: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.admins.len();
        tables.admins.retain(|_, a| a.username != username);
        Ok(tables.admins.len() < before)
    }
}

#[rocket::async_trait]
impl VoterStore for MemoryStore {
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let mut tables = self.tables.write().await;
        for existing in tables.voters.values() {
            if existing.username == voter.username {
                return Err(StoreError::Conflict(Constraint::UniqueUsername));
            }
            if existing.voter_id == voter.voter_id {
                return Err(StoreError::Conflict(Constraint::UniqueVoterId));
            }
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        tables.voters.insert(voter.id, voter.clone());
        Ok(voter)
    }

    async fn voter_by_id(&self, id: Id) -> StoreResult<Option<Voter>> {
        Ok(self.tables.read().await.voters.get(&id).cloned())
    }

    async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>> {
        let tables = self.tables.read().await;
        Ok(tables
            .voters
            .values()
            .find(|v| v.username == username)
            .cloned())
    }

    async fn voters(&self, limit: Option<usize>) -> StoreResult<Vec<Voter>> {
        let mut voters: Vec<_> = self.tables.read().await.voters.values().cloned().collect();
        voters.sort_by_key(|v| Reverse((v.registered_at, v.id)));
        if let Some(limit) = limit {
            voters.truncate(limit);
        }
        Ok(voters)
    }

    async fn count_voters(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.voters.len() as u64)
    }

    async fn set_voter_eligibility(
        &self,
        id: Id,
        is_eligible: bool,
    ) -> StoreResult<Option<Voter>> {
        let mut tables = self.tables.write().await;
        Ok(tables.voters.get_mut(&id).map(|voter| {
            voter.is_eligible = is_eligible;
            voter.clone()
        }))
    }

    async fn update_voter_details(
        &self,
        id: Id,
        details: VoterDetails,
    ) -> StoreResult<Option<Voter>> {
        let mut tables = self.tables.write().await;
        Ok(tables.voters.get_mut(&id).map(|voter| {
            voter.phone_number = details.phone_number;
            voter.date_of_birth = details.date_of_birth;
            voter.clone()
        }))
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn insert_election(&self, election: NewElection) -> StoreResult<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.tables
            .write()
            .await
            .elections
            .insert(election.id, election.clone());
        Ok(election)
    }

    async fn election_by_id(&self, id: Id) -> StoreResult<Option<Election>> {
        Ok(self.tables.read().await.elections.get(&id).cloned())
    }

    async fn elections(&self) -> StoreResult<Vec<Election>> {
        let mut elections: Vec<_> = self
            .tables
            .read()
            .await
            .elections
            .values()
            .cloned()
            .collect();
        elections.sort_by_key(|e| Reverse((e.created_at, e.id)));
        Ok(elections)
    }

    async fn replace_election(
        &self,
        id: Id,
        election: ElectionCore,
    ) -> StoreResult<Option<Election>> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.elections.get(&id) else {
            return Ok(None);
        };
        let retimed = existing.start_time != election.start_time
            || existing.end_time != election.end_time;
        if retimed && tables.votes.values().any(|v| v.election_id == id) {
            return Err(StoreError::Conflict(Constraint::VotingWindowFixed));
        }
        Ok(tables.elections.get_mut(&id).map(|existing| {
            existing.election = election;
            existing.clone()
        }))
    }

    async fn delete_election(&self, id: Id) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.elections.contains_key(&id) {
            return Ok(false);
        }
        if tables.votes.values().any(|v| v.election_id == id) {
            return Err(StoreError::Conflict(Constraint::VotedElectionKept));
        }
        tables.elections.remove(&id);
        tables.candidates.retain(|_, c| c.election_id != id);
        trace!("Deleted election {id} and its candidates");
        Ok(true)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        let mut tables = self.tables.write().await;
        if tables
            .candidates
            .values()
            .any(|c| c.election_id == candidate.election_id && c.name == candidate.name)
        {
            return Err(StoreError::Conflict(Constraint::UniqueCandidateName));
        }
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn candidate_by_id(&self, id: Id) -> StoreResult<Option<Candidate>> {
        Ok(self.tables.read().await.candidates.get(&id).cloned())
    }

    async fn candidates_for(&self, election_id: Id) -> StoreResult<Vec<Candidate>> {
        let mut candidates: Vec<_> = self
            .tables
            .read()
            .await
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(candidates)
    }

    async fn delete_candidate(&self, id: Id) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.candidates.contains_key(&id) {
            return Ok(false);
        }
        if tables.votes.values().any(|v| v.candidate_id == id) {
            return Err(StoreError::Conflict(Constraint::VotedCandidateKept));
        }
        Ok(tables.candidates.remove(&id).is_some())
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn vote_by_voter(&self, voter_id: Id, election_id: Id) -> StoreResult<Option<Vote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ballots_cast
            .get(&(voter_id, election_id))
            .and_then(|vote_id| tables.votes.get(vote_id))
            .cloned())
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let mut tables = self.tables.write().await;
        let candidate_matches = tables
            .candidates
            .get(&vote.candidate_id)
            .map_or(false, |c| c.election_id == vote.election_id);
        if !candidate_matches {
            return Err(StoreError::Conflict(Constraint::CandidateBelongsToElection));
        }
        let key = (vote.voter_id, vote.election_id);
        if tables.ballots_cast.contains_key(&key) {
            return Err(StoreError::Conflict(Constraint::OneVotePerElection));
        }
        let vote = Vote {
            id: Id::new(),
            vote,
        };
        tables.ballots_cast.insert(key, vote.id);
        tables.votes.insert(vote.id, vote.clone());
        Ok(vote)
    }

    async fn vote_counts(&self, election_id: Id) -> StoreResult<HashMap<Id, u64>> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for vote in tables.votes.values().filter(|v| v.election_id == election_id) {
            *counts.entry(vote.candidate_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn election_votes(&self, election_id: Id) -> StoreResult<Vec<Vote>> {
        let mut votes: Vec<_> = self
            .tables
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect();
        votes.sort_by_key(|v| (v.cast_at, v.id));
        Ok(votes)
    }

    async fn count_election_votes(&self, election_id: Id) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .values()
            .filter(|v| v.election_id == election_id)
            .count() as u64)
    }

    async fn votes_by_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
        let mut votes: Vec<_> = self
            .tables
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.voter_id == voter_id)
            .cloned()
            .collect();
        votes.sort_by_key(|v| Reverse((v.cast_at, v.id)));
        Ok(votes)
    }

    async fn count_all_votes(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.votes.len() as u64)
    }

    async fn recent_votes(&self, limit: usize) -> StoreResult<Vec<Vote>> {
        let mut votes: Vec<_> = self.tables.read().await.votes.values().cloned().collect();
        votes.sort_by_key(|v| Reverse((v.cast_at, v.id)));
        votes.truncate(limit);
        Ok(votes)
    }
}

#[rocket::async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry> {
        let entry = AuditEntry {
            id: Id::new(),
            entry,
        };
        self.tables.write().await.audit.push(entry.clone());
        Ok(entry)
    }

    async fn recent_audit(&self, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.audit.iter().rev().take(limit).cloned().collect())
    }
}
