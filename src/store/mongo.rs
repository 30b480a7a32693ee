//! A MongoDB-backed store.
//!
//! Uniqueness is enforced by the indexes created in
//! [`ensure_indexes_exist`], and duplicate key errors are translated into
//! [`Constraint`]s. Votes, deletions and retimings run in transactions, so
//! the deployment must be a replica set.
//!
//! A vote transaction bumps the `revision` field of its candidate's
//! document. Every transaction that must not interleave with a vote writes
//! the same documents, so the server aborts one of the two with a write
//! conflict instead of letting both commit.

use std::collections::HashMap;
use std::future::Future;

use log::{debug, warn};
use mongodb::{
    bson::{doc, Bson, Document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, Database,
};
use rocket::futures::TryStreamExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::model::{
    db::{
        admin::{Admin, NewAdmin},
        audit::{AuditEntry, NewAuditEntry},
        candidate::{Candidate, NewCandidate},
        election::{Election, ElectionCore, NewElection},
        vote::{NewVote, Vote},
        voter::{NewVoter, Voter, VoterDetails},
    },
    mongodb::{duplicate_key_message, ensure_indexes_exist, indexes, Coll, Id, MongoCollection},
};

use super::{
    AdminStore, AuditStore, Constraint, ElectionStore, StoreError, StoreResult, VoteStore,
    VoterStore,
};

/// How many times a transaction is attempted when the server reports a
/// transient transaction error, e.g. a write conflict with a concurrent vote.
const TRANSACTION_ATTEMPTS: usize = 3;

/// A [`super::Store`] persisting to MongoDB.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the given database and make sure its indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    /// Insert a new document, returning its generated ID.
    async fn insert<T>(&self, document: &T) -> StoreResult<Id>
    where
        T: MongoCollection + Serialize + Send + Sync,
    {
        let result = self
            .coll::<T>()
            .insert_one(document, None)
            .await
            .map_err(map_write_error)?;
        inserted_id(result.inserted_id)
    }

    /// Find all documents matching `filter`, in the order given by `options`.
    async fn find_all<T>(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>> + Send,
    ) -> StoreResult<Vec<T>>
    where
        T: MongoCollection + DeserializeOwned + Unpin + Send + Sync,
    {
        let found = self
            .coll::<T>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(found)
    }

    /// Apply `update` to a voter, returning the voter as updated.
    async fn update_voter(&self, id: Id, update: Document) -> StoreResult<Option<Voter>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .coll::<Voter>()
            .find_one_and_update(id.as_doc(), update, options)
            .await?)
    }

    /// A single attempt at the vote transaction.
    async fn try_insert_vote(&self, vote: &NewVote) -> StoreResult<Vote> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Dropping the session before commit aborts the transaction, so every
        // early return below leaves nothing behind.
        let candidate_filter = doc! {
            "_id": vote.candidate_id,
            "election_id": vote.election_id,
        };
        let bump = doc! { "$inc": { "revision": 1 } };
        let candidate = self
            .coll::<Candidate>()
            .find_one_and_update_with_session(candidate_filter, bump, None, &mut session)
            .await?;
        if candidate.is_none() {
            session.abort_transaction().await?;
            return Err(StoreError::Conflict(Constraint::CandidateBelongsToElection));
        }

        let result = self
            .coll::<NewVote>()
            .insert_one_with_session(vote, None, &mut session)
            .await
            .map_err(map_write_error)?;
        session.commit_transaction().await?;

        Ok(Vote {
            id: inserted_id(result.inserted_id)?,
            vote: vote.clone(),
        })
    }

    /// A single attempt at replacing an election, refusing to move the
    /// voting window of an election with votes.
    async fn try_replace_election(
        &self,
        id: Id,
        election: &ElectionCore,
    ) -> StoreResult<Option<Election>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let existing = self
            .coll::<Election>()
            .find_one_with_session(id.as_doc(), None, &mut session)
            .await?;
        let Some(existing) = existing else {
            session.abort_transaction().await?;
            return Ok(None);
        };
        let retimed = existing.start_time != election.start_time
            || existing.end_time != election.end_time;
        if retimed {
            let votes = self
                .coll::<Vote>()
                .count_documents_with_session(doc! {"election_id": id}, None, &mut session)
                .await?;
            if votes > 0 {
                session.abort_transaction().await?;
                return Err(StoreError::Conflict(Constraint::VotingWindowFixed));
            }
            // Conflict with any vote being admitted right now.
            self.coll::<Candidate>()
                .update_many_with_session(
                    doc! {"election_id": id},
                    doc! { "$inc": { "revision": 1 } },
                    None,
                    &mut session,
                )
                .await?;
        }

        self.coll::<ElectionCore>()
            .replace_one_with_session(id.as_doc(), election, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(Some(Election {
            id,
            election: election.clone(),
        }))
    }

    /// A single attempt at deleting an election without votes.
    async fn try_delete_election(&self, id: Id) -> StoreResult<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let votes = self
            .coll::<Vote>()
            .count_documents_with_session(doc! {"election_id": id}, None, &mut session)
            .await?;
        if votes > 0 {
            session.abort_transaction().await?;
            return Err(StoreError::Conflict(Constraint::VotedElectionKept));
        }
        let deleted = self
            .coll::<Election>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?
            .deleted_count;
        if deleted == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }
        // Deleting the candidates also conflicts with any vote in flight.
        let candidates = self
            .coll::<Candidate>()
            .delete_many_with_session(doc! {"election_id": id}, None, &mut session)
            .await?
            .deleted_count;

        session.commit_transaction().await?;
        debug!("Deleted election {id} and {candidates} candidates");
        Ok(true)
    }

    /// A single attempt at deleting a candidate without votes.
    async fn try_delete_candidate(&self, id: Id) -> StoreResult<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let votes = self
            .coll::<Vote>()
            .count_documents_with_session(doc! {"candidate_id": id}, None, &mut session)
            .await?;
        if votes > 0 {
            session.abort_transaction().await?;
            return Err(StoreError::Conflict(Constraint::VotedCandidateKept));
        }
        let deleted = self
            .coll::<Candidate>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?
            .deleted_count;

        session.commit_transaction().await?;
        Ok(deleted > 0)
    }
}

/// Run `transaction` until it succeeds, fails for good, or has been
/// attempted [`TRANSACTION_ATTEMPTS`] times.
async fn with_retries<T, F, Fut>(what: &str, mut transaction: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 1;
    loop {
        match transaction().await {
            Err(e) if e.is_transient() && attempt < TRANSACTION_ATTEMPTS => {
                debug!("{what} transaction attempt {attempt} hit a transient error, retrying: {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Translate duplicate key errors into the constraint they violated.
fn map_write_error(err: DbError) -> StoreError {
    let message = match duplicate_key_message(&err) {
        Some(message) => message,
        None => return StoreError::Db(err),
    };
    let violates = |index: &str| message.contains(&format!("index: {index} "));
    let constraint = if violates(indexes::ONE_VOTE_PER_ELECTION) {
        Constraint::OneVotePerElection
    } else if violates(indexes::CANDIDATE_NAME) {
        Constraint::UniqueCandidateName
    } else if violates(indexes::VOTER_ID) {
        Constraint::UniqueVoterId
    } else if violates(indexes::VOTER_USERNAME) || violates(indexes::ADMIN_USERNAME) {
        Constraint::UniqueUsername
    } else {
        warn!("Duplicate key error on an unexpected index: {message}");
        return StoreError::Db(err);
    };
    StoreError::Conflict(constraint)
}

fn inserted_id(id: Bson) -> StoreResult<Id> {
    id.as_object_id()
        .map(Id::from)
        .ok_or_else(|| StoreError::Corrupt(format!("inserted ID {id} is not an ObjectId")))
}

fn limit_option(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[rocket::async_trait]
impl AdminStore for MongoStore {
    async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let id = self.insert(&admin).await?;
        Ok(Admin { id, admin })
    }

    async fn admin_by_id(&self, id: Id) -> StoreResult<Option<Admin>> {
        Ok(self.coll::<Admin>().find_one(id.as_doc(), None).await?)
    }

    async fn admin_by_username(&self, username: &str) -> StoreResult<Option<Admin>> {
        let filter = doc! { "username": username };
        Ok(self.coll::<Admin>().find_one(filter, None).await?)
    }

    async fn admins(&self) -> StoreResult<Vec<Admin>> {
        let options = FindOptions::builder().sort(doc! {"username": 1}).build();
        self.find_all(doc! {}, options).await
    }

    async fn delete_admin(&self, username: &str) -> StoreResult<bool> {
        let filter = doc! { "username": username };
        let result = self.coll::<Admin>().delete_one(filter, None).await?;
        Ok(result.deleted_count > 0)
    }
}

#[rocket::async_trait]
impl VoterStore for MongoStore {
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let id = self.insert(&voter).await?;
        Ok(Voter { id, voter })
    }

    async fn voter_by_id(&self, id: Id) -> StoreResult<Option<Voter>> {
        Ok(self.coll::<Voter>().find_one(id.as_doc(), None).await?)
    }

    async fn voter_by_username(&self, username: &str) -> StoreResult<Option<Voter>> {
        let filter = doc! { "username": username };
        Ok(self.coll::<Voter>().find_one(filter, None).await?)
    }

    async fn voters(&self, limit: Option<usize>) -> StoreResult<Vec<Voter>> {
        let options = FindOptions::builder()
            .sort(doc! {"registered_at": -1, "_id": -1})
            .limit(limit.map(limit_option))
            .build();
        self.find_all(doc! {}, options).await
    }

    async fn count_voters(&self) -> StoreResult<u64> {
        Ok(self.coll::<Voter>().count_documents(doc! {}, None).await?)
    }

    async fn set_voter_eligibility(
        &self,
        id: Id,
        is_eligible: bool,
    ) -> StoreResult<Option<Voter>> {
        let update = doc! { "$set": { "is_eligible": is_eligible } };
        self.update_voter(id, update).await
    }

    async fn update_voter_details(
        &self,
        id: Id,
        details: VoterDetails,
    ) -> StoreResult<Option<Voter>> {
        let update = doc! {
            "$set": {
                "phone_number": details.phone_number,
                "date_of_birth": details.date_of_birth.to_string(),
            }
        };
        self.update_voter(id, update).await
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn insert_election(&self, election: NewElection) -> StoreResult<Election> {
        let id = self.insert(&election).await?;
        Ok(Election { id, election })
    }

    async fn election_by_id(&self, id: Id) -> StoreResult<Option<Election>> {
        Ok(self.coll::<Election>().find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self) -> StoreResult<Vec<Election>> {
        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1, "_id": -1})
            .build();
        self.find_all(doc! {}, options).await
    }

    async fn replace_election(
        &self,
        id: Id,
        election: ElectionCore,
    ) -> StoreResult<Option<Election>> {
        with_retries("Election update", || self.try_replace_election(id, &election)).await
    }

    async fn delete_election(&self, id: Id) -> StoreResult<bool> {
        with_retries("Election deletion", || self.try_delete_election(id)).await
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        let id = self.insert(&candidate).await?;
        Ok(Candidate { id, candidate })
    }

    async fn candidate_by_id(&self, id: Id) -> StoreResult<Option<Candidate>> {
        Ok(self.coll::<Candidate>().find_one(id.as_doc(), None).await?)
    }

    async fn candidates_for(&self, election_id: Id) -> StoreResult<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! {"name": 1}).build();
        self.find_all(doc! {"election_id": election_id}, options)
            .await
    }

    async fn delete_candidate(&self, id: Id) -> StoreResult<bool> {
        with_retries("Candidate deletion", || self.try_delete_candidate(id)).await
    }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn vote_by_voter(&self, voter_id: Id, election_id: Id) -> StoreResult<Option<Vote>> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.coll::<Vote>().find_one(filter, None).await?)
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        with_retries("Vote", || self.try_insert_vote(&vote)).await
    }

    async fn vote_counts(&self, election_id: Id) -> StoreResult<HashMap<Id, u64>> {
        let pipeline = [
            doc! { "$match": { "election_id": election_id } },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let mut cursor = self.coll::<Vote>().aggregate(pipeline, None).await?;
        let mut counts = HashMap::new();
        while let Some(group) = cursor.try_next().await? {
            let candidate_id = Id::from(group.get_object_id("_id")?);
            let count = match group.get("count") {
                Some(Bson::Int32(n)) => u64::try_from(*n).ok(),
                Some(Bson::Int64(n)) => u64::try_from(*n).ok(),
                _ => None,
            }
            .ok_or_else(|| StoreError::Corrupt(format!("bad vote count for {candidate_id}")))?;
            counts.insert(candidate_id, count);
        }
        Ok(counts)
    }

    async fn election_votes(&self, election_id: Id) -> StoreResult<Vec<Vote>> {
        let options = FindOptions::builder()
            .sort(doc! {"cast_at": 1, "_id": 1})
            .build();
        self.find_all(doc! {"election_id": election_id}, options)
            .await
    }

    async fn count_election_votes(&self, election_id: Id) -> StoreResult<u64> {
        let filter = doc! { "election_id": election_id };
        Ok(self.coll::<Vote>().count_documents(filter, None).await?)
    }

    async fn votes_by_voter(&self, voter_id: Id) -> StoreResult<Vec<Vote>> {
        let options = FindOptions::builder()
            .sort(doc! {"cast_at": -1, "_id": -1})
            .build();
        self.find_all(doc! {"voter_id": voter_id}, options).await
    }

    async fn count_all_votes(&self) -> StoreResult<u64> {
        Ok(self.coll::<Vote>().count_documents(doc! {}, None).await?)
    }

    async fn recent_votes(&self, limit: usize) -> StoreResult<Vec<Vote>> {
        let options = FindOptions::builder()
            .sort(doc! {"cast_at": -1, "_id": -1})
            .limit(limit_option(limit))
            .build();
        self.find_all(doc! {}, options).await
    }
}

#[rocket::async_trait]
impl AuditStore for MongoStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry> {
        let id = self.insert(&entry).await?;
        Ok(AuditEntry { id, entry })
    }

    async fn recent_audit(&self, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let options = FindOptions::builder()
            .sort(doc! {"timestamp": -1, "_id": -1})
            .limit(limit_option(limit))
            .build();
        self.find_all(doc! {}, options).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::db::{candidate::CandidateCore, election::ElectionCore};

    /// Connect to the replica set named by `BALLOT_TEST_DB_URI`, using a fresh database.
    async fn test_store() -> (MongoStore, Database) {
        let uri = std::env::var("BALLOT_TEST_DB_URI").expect("`BALLOT_TEST_DB_URI` not set");
        let random: u32 = rand::random();
        let store = MongoStore::connect(&uri, &format!("test{random}"))
            .await
            .unwrap();
        let db = store.db.clone();
        (store, db)
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set at BALLOT_TEST_DB_URI"]
    async fn unique_index_rejects_second_vote() {
        let (store, db) = test_store().await;

        let election = store
            .insert_election(ElectionCore::ongoing_example(Utc::now()))
            .await
            .unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id, "Harry"))
            .await
            .unwrap();
        let vote = NewVote {
            voter_id: Id::new(),
            candidate_id: candidate.id,
            election_id: election.id,
            cast_at: Utc::now(),
            address: None,
        };

        store.insert_vote(vote.clone()).await.unwrap();
        let err = store.insert_vote(vote).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict(Constraint::OneVotePerElection)
        ));
        let counts = store.vote_counts(election.id).await.unwrap();
        assert_eq!(counts.get(&candidate.id), Some(&1));

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set at BALLOT_TEST_DB_URI"]
    async fn voted_records_are_kept() {
        let (store, db) = test_store().await;

        let election = store
            .insert_election(ElectionCore::ongoing_example(Utc::now()))
            .await
            .unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id, "Harry"))
            .await
            .unwrap();
        store
            .insert_vote(NewVote {
                voter_id: Id::new(),
                candidate_id: candidate.id,
                election_id: election.id,
                cast_at: Utc::now(),
                address: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            store.delete_candidate(candidate.id).await.unwrap_err(),
            StoreError::Conflict(Constraint::VotedCandidateKept)
        ));
        assert!(matches!(
            store.delete_election(election.id).await.unwrap_err(),
            StoreError::Conflict(Constraint::VotedElectionKept)
        ));
        let mut retimed = election.election.clone();
        retimed.end_time += chrono::Duration::hours(1);
        assert!(matches!(
            store.replace_election(election.id, retimed).await.unwrap_err(),
            StoreError::Conflict(Constraint::VotingWindowFixed)
        ));

        // The vote's write to the candidate document still deserialises.
        let stored = store.candidate_by_id(candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.name, candidate.name);
        assert_eq!(stored.election_id, election.id);

        db.drop(None).await.unwrap();
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set at BALLOT_TEST_DB_URI"]
    async fn unique_index_rejects_duplicate_candidate_name() {
        let (store, db) = test_store().await;

        let election = store
            .insert_election(ElectionCore::ongoing_example(Utc::now()))
            .await
            .unwrap();
        store
            .insert_candidate(CandidateCore::example(election.id, "Harry"))
            .await
            .unwrap();
        let err = store
            .insert_candidate(CandidateCore::example(election.id, "Harry"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict(Constraint::UniqueCandidateName)
        ));

        db.drop(None).await.unwrap();
    }
}
