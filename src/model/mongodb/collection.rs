use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    admin::Admin,
    audit::AuditEntry,
    candidate::Candidate,
    election::Election,
    vote::Vote,
    voter::Voter,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Implement [`MongoCollection`] for a stored type and its `*Core` insertion type.
macro_rules! collection {
    ($name:expr => $($ty:ty),+) => {
        $(
            impl MongoCollection for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

collection!("admins" => Admin, crate::model::db::admin::AdminCore);
collection!("voters" => Voter, crate::model::db::voter::VoterCore);
collection!("elections" => Election, crate::model::db::election::ElectionCore);
collection!("candidates" => Candidate, crate::model::db::candidate::CandidateCore);
collection!("votes" => Vote, crate::model::db::vote::VoteCore);
collection!("audit_log" => AuditEntry, crate::model::db::audit::AuditEntryCore);

/// Names of the unique indexes, which appear in duplicate key error messages.
pub mod indexes {
    pub const ADMIN_USERNAME: &str = "admin_username";
    pub const VOTER_USERNAME: &str = "voter_username";
    pub const VOTER_ID: &str = "voter_id";
    pub const CANDIDATE_NAME: &str = "election_candidate_name";
    pub const ONE_VOTE_PER_ELECTION: &str = "one_vote_per_election";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = |name: &str| {
        IndexOptions::builder()
            .unique(true)
            .name(name.to_string())
            .build()
    };

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique(indexes::ADMIN_USERNAME))
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // Voter collection.
    let voter_indexes = [
        IndexModel::builder()
            .keys(doc! {"username": 1})
            .options(unique(indexes::VOTER_USERNAME))
            .build(),
        IndexModel::builder()
            .keys(doc! {"voter_id": 1})
            .options(unique(indexes::VOTER_ID))
            .build(),
    ];
    Coll::<Voter>::from_db(db)
        .create_indexes(voter_indexes, None)
        .await?;

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "name": 1})
        .options(unique(indexes::CANDIDATE_NAME))
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Vote collection. This index is what actually guarantees one vote per voter.
    let vote_indexes = [
        IndexModel::builder()
            .keys(doc! {"voter_id": 1, "election_id": 1})
            .options(unique(indexes::ONE_VOTE_PER_ELECTION))
            .build(),
        IndexModel::builder()
            .keys(doc! {"election_id": 1, "candidate_id": 1})
            .build(),
    ];
    Coll::<Vote>::from_db(db)
        .create_indexes(vote_indexes, None)
        .await?;

    Ok(())
}
