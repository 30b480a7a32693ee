use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    api::common::ClientAddr,
    engine::manage,
    error::Result,
    model::{
        api::{
            admin::{AdminCredentials, AdminDescription},
            auth::AuthToken,
            candidate::{CandidateDescription, CandidateSpec},
            dashboard::{AuditEntryDescription, Dashboard, DASHBOARD_RECENT},
            election::{ElectionDescription, ElectionSpec},
            pagination::{Paginated, Pagination},
            voter::{EligibilityUpdate, VoterProfile},
        },
        db::{admin::Admin, election::Election},
        mongodb::Id,
    },
    store::{AdminStore, AuditStore, ElectionStore, SharedStore, VoteStore, VoterStore},
};

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 500;

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        delete_admin,
        create_election,
        modify_election,
        delete_election,
        add_candidate,
        remove_candidate,
        get_voters,
        set_eligibility,
        dashboard,
        audit_log,
    ]
}

#[get("/admins")]
async fn get_admins(
    _token: AuthToken<Admin>,
    store: &State<SharedStore>,
) -> Result<Json<Vec<AdminDescription>>> {
    let admins = store.admins().await?;
    Ok(Json(admins.into_iter().map(Into::into).collect()))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<Json<AdminDescription>> {
    let admin = manage::create_admin(store.inner().as_ref(), new_admin.0, token.id, addr.0).await?;
    Ok(Json(admin.into()))
}

#[delete("/admins", data = "<username>", format = "json")]
async fn delete_admin(
    token: AuthToken<Admin>,
    username: String,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<()> {
    manage::delete_admin(store.inner().as_ref(), &username, token.id, addr.0).await?;
    Ok(())
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<Json<ElectionDescription>> {
    let now = Utc::now();
    let election =
        manage::create_election(store.inner().as_ref(), spec.0, token.id, now, addr.0).await?;
    Ok(Json(ElectionDescription::new(&election, Vec::new(), now)))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<Json<ElectionDescription>> {
    let now = Utc::now();
    let election = manage::update_election(
        store.inner().as_ref(),
        election_id,
        spec.0,
        token.id,
        now,
        addr.0,
    )
    .await?;
    let candidates = candidates_of(store, &election).await?;
    Ok(Json(ElectionDescription::new(&election, candidates, now)))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Admin>,
    election_id: Id,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<()> {
    manage::delete_election(store.inner().as_ref(), election_id, token.id, addr.0).await?;
    Ok(())
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn add_candidate(
    token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<CandidateSpec>,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<Json<CandidateDescription>> {
    let candidate = manage::add_candidate(
        store.inner().as_ref(),
        election_id,
        spec.0,
        token.id,
        Utc::now(),
        addr.0,
    )
    .await?;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn remove_candidate(
    token: AuthToken<Admin>,
    candidate_id: Id,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<()> {
    manage::remove_candidate(store.inner().as_ref(), candidate_id, token.id, addr.0).await?;
    Ok(())
}

/// Registered voters, most recent first.
#[get("/voters")]
async fn get_voters(
    _token: AuthToken<Admin>,
    pagination: Pagination,
    store: &State<SharedStore>,
) -> Result<Json<Paginated<VoterProfile>>> {
    let voters = store
        .voters(None)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(pagination.paginate(voters)))
}

#[put("/voters/<voter_id>/eligibility", data = "<update>", format = "json")]
async fn set_eligibility(
    token: AuthToken<Admin>,
    voter_id: Id,
    update: Json<EligibilityUpdate>,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<Json<VoterProfile>> {
    let voter = manage::set_voter_eligibility(
        store.inner().as_ref(),
        voter_id,
        update.is_eligible,
        token.id,
        addr.0,
    )
    .await?;
    Ok(Json(voter.into()))
}

#[get("/admin/dashboard")]
async fn dashboard(
    _token: AuthToken<Admin>,
    store: &State<SharedStore>,
) -> Result<Json<Dashboard>> {
    let elections = store.elections().await?;
    let active_elections = elections.iter().filter(|election| election.is_active).count();

    Ok(Json(Dashboard {
        total_elections: elections.len(),
        active_elections,
        total_voters: store.count_voters().await?,
        total_votes: store.count_all_votes().await?,
        recent_votes: store
            .recent_votes(DASHBOARD_RECENT)
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
        recent_registrations: store
            .voters(Some(DASHBOARD_RECENT))
            .await?
            .into_iter()
            .map(Into::into)
            .collect(),
    }))
}

/// The most recent audit log entries, newest first.
#[get("/admin/audit?<limit>")]
async fn audit_log(
    _token: AuthToken<Admin>,
    limit: Option<usize>,
    store: &State<SharedStore>,
) -> Result<Json<Vec<AuditEntryDescription>>> {
    let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    let entries = store.recent_audit(limit).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

async fn candidates_of(
    store: &SharedStore,
    election: &Election,
) -> Result<Vec<CandidateDescription>> {
    Ok(store
        .candidates_for(election.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}
