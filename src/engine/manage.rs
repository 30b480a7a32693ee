//! Administrative operations and voter registration.
//!
//! These validate input and keep elections consistent with the votes already
//! cast in them. Each successful operation is written to the audit log.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use thiserror::Error;

use crate::model::{
    api::{
        admin::{check_credentials, AdminCredentials, CredentialsError},
        candidate::CandidateSpec,
        election::ElectionSpec,
        voter::{ProfileUpdate, VoterRegistration},
    },
    common::{age_on, hash_password, AuditAction, MINIMUM_VOTING_AGE},
    db::{
        admin::{Admin, NewAdmin},
        candidate::Candidate,
        election::Election,
        voter::{NewVoter, Voter, VoterDetails},
    },
    mongodb::Id,
};
use crate::store::{AdminStore, AuditStore, ElectionStore, StoreError, VoterStore};

use super::audit;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_CANDIDATE_NAME_LENGTH: usize = 100;
pub const MAX_PARTY_LENGTH: usize = 100;
pub const MAX_VOTER_ID_LENGTH: usize = 20;
pub const MAX_PHONE_NUMBER_LENGTH: usize = 15;

#[derive(Debug, Error)]
pub enum ManageError {
    #[error("{0}")]
    Invalid(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Failed to hash password: {0}")]
    Hash(#[from] argon2::Error),
    #[error(transparent)]
    Store(StoreError),
}

impl ManageError {
    /// A short name for this kind of failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "BadRequest",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::Hash(_) | Self::Store(_) => "InternalError",
        }
    }
}

impl From<StoreError> for ManageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(constraint) => Self::Conflict(constraint.to_string()),
            err => Self::Store(err),
        }
    }
}

impl From<CredentialsError> for ManageError {
    fn from(err: CredentialsError) -> Self {
        match err {
            CredentialsError::Hash(e) => Self::Hash(e),
            err => Self::Invalid(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManageError>;

/// Check the length of a required text field, ignoring surrounding whitespace.
fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    let length = value.trim().chars().count();
    if length == 0 {
        Err(ManageError::Invalid(format!("{field} must not be empty")))
    } else if length > max {
        Err(ManageError::Invalid(format!(
            "{field} must be at most {max} characters"
        )))
    } else {
        Ok(())
    }
}

fn check_window(spec: &ElectionSpec) -> Result<()> {
    check_length("Title", &spec.title, MAX_TITLE_LENGTH)?;
    if spec.start_time >= spec.end_time {
        return Err(ManageError::Invalid(
            "Election must start before it ends".to_string(),
        ));
    }
    Ok(())
}

async fn election_by_id<S>(store: &S, id: Id) -> Result<Election>
where
    S: ElectionStore + ?Sized,
{
    store
        .election_by_id(id)
        .await?
        .ok_or_else(|| ManageError::NotFound(format!("Election {id}")))
}

/// Validate the details a voter supplies about themselves. They must be of
/// voting age on the day of `now`. A blank phone number is no phone number.
fn check_details(
    phone_number: Option<String>,
    date_of_birth: NaiveDate,
    now: DateTime<Utc>,
) -> Result<VoterDetails> {
    let today = now.date_naive();
    if date_of_birth > today {
        return Err(ManageError::Invalid(
            "Date of birth is in the future".to_string(),
        ));
    }
    if age_on(date_of_birth, today) < MINIMUM_VOTING_AGE {
        return Err(ManageError::Invalid(format!(
            "Voters must be at least {MINIMUM_VOTING_AGE} years old"
        )));
    }

    let phone_number = phone_number
        .map(|number| number.trim().to_string())
        .filter(|number| !number.is_empty());
    if let Some(number) = &phone_number {
        if number.chars().count() > MAX_PHONE_NUMBER_LENGTH {
            return Err(ManageError::Invalid(format!(
                "Phone number must be at most {MAX_PHONE_NUMBER_LENGTH} characters"
            )));
        }
    }
    Ok(VoterDetails {
        phone_number,
        date_of_birth,
    })
}

/// Register a new voter. They must be of voting age on the day of `now`.
pub async fn register_voter<S>(
    store: &S,
    registration: VoterRegistration,
    now: DateTime<Utc>,
    address: Option<IpAddr>,
) -> Result<Voter>
where
    S: VoterStore + AuditStore + ?Sized,
{
    check_credentials(&registration.username, &registration.password)?;
    check_length("Voter ID", &registration.voter_id, MAX_VOTER_ID_LENGTH)?;
    let details = check_details(registration.phone_number, registration.date_of_birth, now)?;

    let voter = NewVoter {
        password_hash: hash_password(&registration.password)?,
        username: registration.username,
        voter_id: registration.voter_id.trim().to_string(),
        date_of_birth: details.date_of_birth,
        phone_number: details.phone_number,
        is_eligible: true,
        registered_at: now,
    };

    let voter = store.insert_voter(voter).await?;
    info!("Registered voter {} ({})", voter.username, voter.id);
    audit::record(
        store,
        Some(voter.id),
        AuditAction::VoterRegistered,
        format!("Registered voter {}", voter.username),
        address,
    )
    .await;
    Ok(voter)
}

/// Change a voter's own details, under the same rules as registration.
pub async fn update_profile<S>(
    store: &S,
    voter_id: Id,
    update: ProfileUpdate,
    now: DateTime<Utc>,
    address: Option<IpAddr>,
) -> Result<Voter>
where
    S: VoterStore + AuditStore + ?Sized,
{
    let details = check_details(update.phone_number, update.date_of_birth, now)?;
    let voter = store
        .update_voter_details(voter_id, details)
        .await?
        .ok_or_else(|| ManageError::NotFound(format!("Voter {voter_id}")))?;
    audit::record(
        store,
        Some(voter.id),
        AuditAction::ProfileUpdated,
        format!("Voter {} updated their profile", voter.username),
        address,
    )
    .await;
    Ok(voter)
}

/// Create the given admin if there are no admins at all.
pub async fn bootstrap_admin<S>(store: &S, credentials: AdminCredentials) -> Result<Option<Admin>>
where
    S: AdminStore + AuditStore + ?Sized,
{
    if !store.admins().await?.is_empty() {
        return Ok(None);
    }
    let admin = store.insert_admin(credentials.try_into()?).await?;
    info!("Created initial admin {}", admin.username);
    audit::record(
        store,
        None,
        AuditAction::AdminCreated,
        format!("Created initial admin {}", admin.username),
        None,
    )
    .await;
    Ok(Some(admin))
}

pub async fn create_admin<S>(
    store: &S,
    credentials: AdminCredentials,
    actor: Id,
    address: Option<IpAddr>,
) -> Result<Admin>
where
    S: AdminStore + AuditStore + ?Sized,
{
    let admin: NewAdmin = credentials.try_into()?;
    let admin = store.insert_admin(admin).await?;
    audit::record(
        store,
        Some(actor),
        AuditAction::AdminCreated,
        format!("Created admin {}", admin.username),
        address,
    )
    .await;
    Ok(admin)
}

/// Delete an admin by username. The last admin cannot be deleted.
pub async fn delete_admin<S>(
    store: &S,
    username: &str,
    actor: Id,
    address: Option<IpAddr>,
) -> Result<()>
where
    S: AdminStore + AuditStore + ?Sized,
{
    let admins = store.admins().await?;
    if !admins.iter().any(|admin| admin.username == username) {
        return Err(ManageError::NotFound(format!("Admin {username}")));
    }
    if admins.len() == 1 {
        return Err(ManageError::Conflict(
            "Cannot delete the last admin".to_string(),
        ));
    }
    if !store.delete_admin(username).await? {
        return Err(ManageError::NotFound(format!("Admin {username}")));
    }
    audit::record(
        store,
        Some(actor),
        AuditAction::AdminDeleted,
        format!("Deleted admin {username}"),
        address,
    )
    .await;
    Ok(())
}

/// Create an election. It may not start in the past.
pub async fn create_election<S>(
    store: &S,
    spec: ElectionSpec,
    creator: Id,
    now: DateTime<Utc>,
    address: Option<IpAddr>,
) -> Result<Election>
where
    S: ElectionStore + AuditStore + ?Sized,
{
    check_window(&spec)?;
    if spec.start_time < now {
        return Err(ManageError::Invalid(
            "Election cannot start in the past".to_string(),
        ));
    }

    let election = store
        .insert_election(spec.into_election(creator, now))
        .await?;
    info!("Created election {} ({})", election.title, election.id);
    audit::record(
        store,
        Some(creator),
        AuditAction::ElectionCreated,
        format!("Created election {} ({})", election.title, election.id),
        address,
    )
    .await;
    Ok(election)
}

/// Edit an election. Once it has votes, its start and end times are fixed.
pub async fn update_election<S>(
    store: &S,
    id: Id,
    spec: ElectionSpec,
    actor: Id,
    now: DateTime<Utc>,
    address: Option<IpAddr>,
) -> Result<Election>
where
    S: ElectionStore + AuditStore + ?Sized,
{
    check_window(&spec)?;
    let mut election = election_by_id(store, id).await?;

    // The store refuses to move the window of an election with votes.
    spec.apply_to(&mut election, now);
    let election = store
        .replace_election(id, election.election)
        .await?
        .ok_or_else(|| ManageError::NotFound(format!("Election {id}")))?;
    audit::record(
        store,
        Some(actor),
        AuditAction::ElectionUpdated,
        format!("Updated election {} ({id})", election.title),
        address,
    )
    .await;
    Ok(election)
}

/// Delete an election and its candidates. Elections with votes are kept.
pub async fn delete_election<S>(
    store: &S,
    id: Id,
    actor: Id,
    address: Option<IpAddr>,
) -> Result<()>
where
    S: ElectionStore + AuditStore + ?Sized,
{
    let election = election_by_id(store, id).await?;
    if !store.delete_election(id).await? {
        return Err(ManageError::NotFound(format!("Election {id}")));
    }
    info!("Deleted election {} ({id})", election.title);
    audit::record(
        store,
        Some(actor),
        AuditAction::ElectionDeleted,
        format!("Deleted election {} ({id})", election.title),
        address,
    )
    .await;
    Ok(())
}

pub async fn add_candidate<S>(
    store: &S,
    election_id: Id,
    spec: CandidateSpec,
    actor: Id,
    now: DateTime<Utc>,
    address: Option<IpAddr>,
) -> Result<Candidate>
where
    S: ElectionStore + AuditStore + ?Sized,
{
    check_length("Candidate name", &spec.name, MAX_CANDIDATE_NAME_LENGTH)?;
    if spec.party.chars().count() > MAX_PARTY_LENGTH {
        return Err(ManageError::Invalid(format!(
            "Party must be at most {MAX_PARTY_LENGTH} characters"
        )));
    }
    let election = election_by_id(store, election_id).await?;

    let candidate = store
        .insert_candidate(spec.into_candidate(election.id, now))
        .await?;
    audit::record(
        store,
        Some(actor),
        AuditAction::CandidateAdded,
        format!(
            "Added candidate {} ({}) to election {}",
            candidate.name, candidate.id, election.id
        ),
        address,
    )
    .await;
    Ok(candidate)
}

/// Remove a candidate who has not received any votes.
pub async fn remove_candidate<S>(
    store: &S,
    id: Id,
    actor: Id,
    address: Option<IpAddr>,
) -> Result<()>
where
    S: ElectionStore + AuditStore + ?Sized,
{
    let candidate = store
        .candidate_by_id(id)
        .await?
        .ok_or_else(|| ManageError::NotFound(format!("Candidate {id}")))?;
    if !store.delete_candidate(id).await? {
        return Err(ManageError::NotFound(format!("Candidate {id}")));
    }
    audit::record(
        store,
        Some(actor),
        AuditAction::CandidateDeleted,
        format!(
            "Removed candidate {} ({id}) from election {}",
            candidate.name, candidate.election_id
        ),
        address,
    )
    .await;
    Ok(())
}

pub async fn set_voter_eligibility<S>(
    store: &S,
    voter_id: Id,
    is_eligible: bool,
    actor: Id,
    address: Option<IpAddr>,
) -> Result<Voter>
where
    S: VoterStore + AuditStore + ?Sized,
{
    let voter = store
        .set_voter_eligibility(voter_id, is_eligible)
        .await?
        .ok_or_else(|| ManageError::NotFound(format!("Voter {voter_id}")))?;
    info!("Voter {voter_id} eligibility set to {is_eligible}");
    audit::record(
        store,
        Some(actor),
        AuditAction::VoterEligibilityChanged,
        format!("Set eligibility of voter {} to {is_eligible}", voter.username),
        address,
    )
    .await;
    Ok(voter)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, TimeZone};
    use rocket::tokio;

    use super::*;
    use crate::engine::{admit_vote, tally, AdmissionError};
    use crate::model::db::{
        admin::AdminCore, candidate::CandidateCore, election::ElectionCore, voter::VoterCore,
    };
    use crate::store::{MemoryStore, VoteStore};

    async fn audit_actions(store: &MemoryStore) -> Vec<AuditAction> {
        let mut actions: Vec<_> = store
            .recent_audit(100)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect();
        actions.reverse();
        actions
    }

    #[rocket::async_test]
    async fn registration_checks() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let voter = register_voter(&store, VoterRegistration::example(), now, None)
            .await
            .unwrap();
        assert!(voter.is_eligible);
        assert!(voter.verify_password(VoterRegistration::example().password));

        let duplicate = register_voter(&store, VoterRegistration::example(), now, None).await;
        assert!(matches!(duplicate, Err(ManageError::Conflict(_))));

        let same_voter_id = VoterRegistration {
            username: "someone-else".to_string(),
            ..VoterRegistration::example()
        };
        let duplicate = register_voter(&store, same_voter_id, now, None).await;
        assert!(matches!(duplicate, Err(ManageError::Conflict(_))));

        let today = now.date_naive();
        let invalid = [
            VoterRegistration {
                password: "short".to_string(),
                ..VoterRegistration::example2()
            },
            VoterRegistration {
                username: " ".to_string(),
                ..VoterRegistration::example2()
            },
            VoterRegistration {
                voter_id: "V".repeat(MAX_VOTER_ID_LENGTH + 1),
                ..VoterRegistration::example2()
            },
            VoterRegistration {
                date_of_birth: today + Duration::days(1),
                ..VoterRegistration::example2()
            },
            VoterRegistration {
                date_of_birth: today - Duration::days(365 * 10),
                ..VoterRegistration::example2()
            },
        ];
        for registration in invalid {
            let result = register_voter(&store, registration, now, None).await;
            assert!(matches!(result, Err(ManageError::Invalid(_))));
        }

        assert_eq!(store.count_voters().await.unwrap(), 1);
        assert_eq!(audit_actions(&store).await, [AuditAction::VoterRegistered]);
    }

    #[rocket::async_test]
    async fn voting_age_is_inclusive() {
        let store = MemoryStore::new();
        let now = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 6, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );

        let just_eighteen = VoterRegistration {
            date_of_birth: NaiveDate::from_ymd_opt(2006, 6, 15).unwrap(),
            ..VoterRegistration::example()
        };
        register_voter(&store, just_eighteen, now, None)
            .await
            .unwrap();

        let one_day_short = VoterRegistration {
            date_of_birth: NaiveDate::from_ymd_opt(2006, 6, 16).unwrap(),
            ..VoterRegistration::example2()
        };
        let result = register_voter(&store, one_day_short, now, None).await;
        assert!(matches!(result, Err(ManageError::Invalid(_))));
    }

    #[rocket::async_test]
    async fn election_checks() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let creator = Id::new();

        let election = create_election(&store, ElectionSpec::upcoming_example(), creator, now, None)
            .await
            .unwrap();
        assert_eq!(election.created_by, creator);
        assert_eq!(election.title, ElectionSpec::upcoming_example().title);

        let backwards = ElectionSpec {
            end_time: ElectionSpec::upcoming_example().start_time,
            ..ElectionSpec::upcoming_example()
        };
        let in_the_past = ElectionSpec {
            start_time: now - Duration::hours(1),
            ..ElectionSpec::upcoming_example()
        };
        let untitled = ElectionSpec {
            title: String::new(),
            ..ElectionSpec::upcoming_example()
        };
        let verbose = ElectionSpec {
            title: "x".repeat(MAX_TITLE_LENGTH + 1),
            ..ElectionSpec::upcoming_example()
        };
        for spec in [backwards, in_the_past, untitled, verbose] {
            let result = create_election(&store, spec, creator, now, None).await;
            assert!(matches!(result, Err(ManageError::Invalid(_))));
        }

        assert_eq!(store.elections().await.unwrap().len(), 1);
        assert_eq!(audit_actions(&store).await, [AuditAction::ElectionCreated]);
    }

    #[rocket::async_test]
    async fn timing_freezes_once_votes_exist() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let admin = Id::new();
        let election = create_election(&store, ElectionSpec::upcoming_example(), admin, now, None)
            .await
            .unwrap();
        let candidate = add_candidate(
            &store,
            election.id,
            CandidateSpec::example("Cedric"),
            admin,
            now,
            None,
        )
        .await
        .unwrap();

        // Without votes, the window can move. Open it now.
        let open_now = ElectionSpec {
            start_time: now - Duration::minutes(5),
            ..ElectionSpec::upcoming_example()
        };
        let election = update_election(&store, election.id, open_now.clone(), admin, now, None)
            .await
            .unwrap();
        assert_eq!(election.start_time, open_now.start_time);

        let voter = register_voter(&store, VoterRegistration::example(), now, None)
            .await
            .unwrap();
        admit_vote(&store, &voter, &election, &candidate, now, None)
            .await
            .unwrap();

        let extended = ElectionSpec {
            end_time: open_now.end_time + Duration::days(1),
            ..open_now.clone()
        };
        let result = update_election(&store, election.id, extended, admin, now, None).await;
        assert!(matches!(result, Err(ManageError::Conflict(_))));

        // Other fields remain editable, so voting can be paused.
        let paused = ElectionSpec {
            title: "Triwizard Champion".to_string(),
            is_active: false,
            ..open_now
        };
        let election = update_election(&store, election.id, paused, admin, now, None)
            .await
            .unwrap();
        assert_eq!(election.title, "Triwizard Champion");
        assert!(!election.is_active);
        let stored = store.election_by_id(election.id).await.unwrap().unwrap();
        assert_eq!(stored, election);

        let missing = update_election(
            &store,
            Id::new(),
            ElectionSpec::upcoming_example(),
            admin,
            now,
            None,
        )
        .await;
        assert!(matches!(missing, Err(ManageError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn deletion_is_refused_once_voted() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let admin = Id::new();

        let spare = create_election(&store, ElectionSpec::upcoming_example2(), admin, now, None)
            .await
            .unwrap();
        add_candidate(&store, spare.id, CandidateSpec::example("Viktor"), admin, now, None)
            .await
            .unwrap();
        delete_election(&store, spare.id, admin, None).await.unwrap();
        assert!(store.candidates_for(spare.id).await.unwrap().is_empty());
        let again = delete_election(&store, spare.id, admin, None).await;
        assert!(matches!(again, Err(ManageError::NotFound(_))));

        let open = ElectionSpec {
            start_time: now,
            ..ElectionSpec::upcoming_example()
        };
        let election = create_election(&store, open, admin, now, None).await.unwrap();
        let fleur = add_candidate(
            &store,
            election.id,
            CandidateSpec::example("Fleur"),
            admin,
            now,
            None,
        )
        .await
        .unwrap();
        let viktor = add_candidate(
            &store,
            election.id,
            CandidateSpec::example("Viktor"),
            admin,
            now,
            None,
        )
        .await
        .unwrap();
        let voter = register_voter(&store, VoterRegistration::example(), now, None)
            .await
            .unwrap();
        admit_vote(&store, &voter, &election, &fleur, now, None)
            .await
            .unwrap();

        let result = delete_election(&store, election.id, admin, None).await;
        assert!(matches!(result, Err(ManageError::Conflict(_))));
        let result = remove_candidate(&store, fleur.id, admin, None).await;
        assert!(matches!(result, Err(ManageError::Conflict(_))));

        remove_candidate(&store, viktor.id, admin, None).await.unwrap();
        let names: Vec<_> = store
            .candidates_for(election.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.candidate.name)
            .collect();
        assert_eq!(names, ["Fleur"]);
    }

    #[test]
    fn removal_racing_votes_keeps_every_vote() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = Arc::new(MemoryStore::new());
            let now = Utc::now();
            let admin = Id::new();
            let election = store
                .insert_election(ElectionCore::ongoing_example(now))
                .await
                .unwrap();
            let template = VoterCore::example();

            let mut races = vec![];
            for i in 0..32 {
                let candidate = store
                    .insert_candidate(CandidateCore::example(election.id, &format!("C{i}")))
                    .await
                    .unwrap();
                let voter = store
                    .insert_voter(VoterCore {
                        username: format!("voter{i}"),
                        voter_id: format!("V-{i}"),
                        ..template.clone()
                    })
                    .await
                    .unwrap();

                let candidate_id = candidate.id;
                let removal = {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        remove_candidate(&*store, candidate_id, admin, None).await
                    })
                };
                let vote = {
                    let store = Arc::clone(&store);
                    let election = election.clone();
                    tokio::spawn(async move {
                        admit_vote(&*store, &voter, &election, &candidate, now, None).await
                    })
                };
                races.push((candidate_id, removal, vote));
            }

            for (candidate_id, removal, vote) in races {
                let removal = removal.await.unwrap();
                let vote = vote.await.unwrap();
                let kept = store.candidate_by_id(candidate_id).await.unwrap().is_some();
                match (removal, vote) {
                    (Ok(()), Err(AdmissionError::CandidateMismatch { .. })) => assert!(!kept),
                    (Err(ManageError::Conflict(_)), Ok(_)) => assert!(kept),
                    outcome => panic!("removal and vote both took effect: {outcome:?}"),
                }
            }

            let recorded = store.count_election_votes(election.id).await.unwrap();
            let report = tally(&*store, &election, now, true).await.unwrap();
            assert_eq!(report.total_votes, recorded);
        });
    }

    #[rocket::async_test]
    async fn profile_updates() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let voter = register_voter(&store, VoterRegistration::example2(), now, None)
            .await
            .unwrap();
        assert_eq!(voter.phone_number.as_deref(), Some("07700 900981"));

        let update = ProfileUpdate {
            phone_number: Some("   ".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1981, 8, 12).unwrap(),
        };
        let updated = update_profile(&store, voter.id, update.clone(), now, None)
            .await
            .unwrap();
        assert_eq!(updated.phone_number, None);
        assert_eq!(updated.date_of_birth, update.date_of_birth);
        assert_eq!(updated.voter_id, voter.voter_id);

        let today = now.date_naive();
        for date_of_birth in [today + Duration::days(1), today - Duration::days(365 * 10)] {
            let update = ProfileUpdate {
                phone_number: None,
                date_of_birth,
            };
            let result = update_profile(&store, voter.id, update, now, None).await;
            assert!(matches!(result, Err(ManageError::Invalid(_))));
        }

        let missing = update_profile(&store, Id::new(), update, now, None).await;
        assert!(matches!(missing, Err(ManageError::NotFound(_))));

        assert_eq!(
            audit_actions(&store).await,
            [AuditAction::VoterRegistered, AuditAction::ProfileUpdated]
        );
    }

    #[rocket::async_test]
    async fn candidate_checks() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let admin = Id::new();
        let election = create_election(&store, ElectionSpec::upcoming_example(), admin, now, None)
            .await
            .unwrap();

        add_candidate(&store, election.id, CandidateSpec::example("Cho"), admin, now, None)
            .await
            .unwrap();
        let cho = CandidateSpec::example("Cho");
        let duplicate = add_candidate(&store, election.id, cho, admin, now, None).await;
        assert!(matches!(duplicate, Err(ManageError::Conflict(_))));

        let long_party = CandidateSpec {
            party: "p".repeat(MAX_PARTY_LENGTH + 1),
            ..CandidateSpec::example("Padma")
        };
        let nameless = CandidateSpec::example("  ");
        for spec in [long_party, nameless] {
            let result = add_candidate(&store, election.id, spec, admin, now, None).await;
            assert!(matches!(result, Err(ManageError::Invalid(_))));
        }

        let padma = CandidateSpec::example("Padma");
        let nowhere = add_candidate(&store, Id::new(), padma, admin, now, None).await;
        assert!(matches!(nowhere, Err(ManageError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn eligibility_changes_are_audited() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let admin = Id::new();
        let voter = register_voter(&store, VoterRegistration::example(), now, None)
            .await
            .unwrap();

        let voter = set_voter_eligibility(&store, voter.id, false, admin, None)
            .await
            .unwrap();
        assert!(!voter.is_eligible);
        let stored = store.voter_by_id(voter.id).await.unwrap().unwrap();
        assert!(!stored.is_eligible);

        let missing = set_voter_eligibility(&store, Id::new(), true, admin, None).await;
        assert!(matches!(missing, Err(ManageError::NotFound(_))));

        let entries = store.recent_audit(1).await.unwrap();
        assert_eq!(entries[0].action, AuditAction::VoterEligibilityChanged);
        assert_eq!(entries[0].actor, Some(admin));
    }

    #[rocket::async_test]
    async fn last_admin_stays() {
        let store = MemoryStore::new();
        let first = bootstrap_admin(&store, AdminCredentials::example1())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.username, AdminCore::example().username);

        // Only bootstraps an empty store.
        let again = bootstrap_admin(&store, AdminCredentials::example2()).await.unwrap();
        assert!(again.is_none());

        let result = delete_admin(&store, &first.username, first.id, None).await;
        assert!(matches!(result, Err(ManageError::Conflict(_))));

        let second = create_admin(&store, AdminCredentials::example2(), first.id, None)
            .await
            .unwrap();
        let duplicate = create_admin(&store, AdminCredentials::example2(), first.id, None).await;
        assert!(matches!(duplicate, Err(ManageError::Conflict(_))));

        delete_admin(&store, &first.username, second.id, None)
            .await
            .unwrap();
        let missing = delete_admin(&store, "nobody", second.id, None).await;
        assert!(matches!(missing, Err(ManageError::NotFound(_))));

        assert_eq!(
            audit_actions(&store).await,
            [
                AuditAction::AdminCreated,
                AuditAction::AdminCreated,
                AuditAction::AdminDeleted
            ]
        );
    }
}
