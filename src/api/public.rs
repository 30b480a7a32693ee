use std::cmp::Reverse;

use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    api::common::visible_election,
    engine::{self, classify},
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            candidate::CandidateDescription,
            dump::ElectionDump,
            election::{ElectionDescription, ElectionOverview, ElectionStatus, ElectionSummary},
            pagination::{Paginated, Pagination},
            tally::TallyReport,
        },
        common::WindowState,
        db::{admin::Admin, election::Election},
        mongodb::Id,
    },
    store::{ElectionStore, SharedStore, VoteStore},
};

/// How many finished elections the overview lists.
const RECENTLY_FINISHED: usize = 5;

pub fn routes() -> Vec<Route> {
    routes![
        elections_admin,
        elections_non_admin,
        overview,
        election_admin,
        election_non_admin,
        status,
        results,
        dump,
    ]
}

#[get("/elections", rank = 1)]
async fn elections_admin(
    _token: AuthToken<Admin>,
    pagination: Pagination,
    store: &State<SharedStore>,
) -> Result<Json<Paginated<ElectionSummary>>> {
    let now = Utc::now();
    let elections = store
        .elections()
        .await?
        .iter()
        .map(|election| ElectionSummary::new(election, now))
        .collect();
    Ok(Json(pagination.paginate(elections)))
}

#[get("/elections", rank = 2)]
async fn elections_non_admin(
    pagination: Pagination,
    store: &State<SharedStore>,
) -> Result<Json<Paginated<ElectionSummary>>> {
    let now = Utc::now();
    let elections = store
        .elections()
        .await?
        .iter()
        .filter(|election| election.is_active)
        .map(|election| ElectionSummary::new(election, now))
        .collect();
    Ok(Json(pagination.paginate(elections)))
}

/// Ongoing elections closing soonest first, upcoming elections opening
/// soonest first, and the most recently finished elections.
#[get("/elections/overview")]
async fn overview(store: &State<SharedStore>) -> Result<Json<ElectionOverview>> {
    let now = Utc::now();
    let elections = store.elections().await?;

    let in_state = |state: WindowState| -> Vec<&Election> {
        elections
            .iter()
            .filter(|election| classify(election, now) == state)
            .collect()
    };
    let summarize = |elections: Vec<&Election>| -> Vec<ElectionSummary> {
        elections
            .into_iter()
            .map(|election| ElectionSummary::new(election, now))
            .collect()
    };

    let mut ongoing = in_state(WindowState::Ongoing);
    ongoing.sort_by_key(|election| election.end_time);
    let mut upcoming = in_state(WindowState::Upcoming);
    upcoming.sort_by_key(|election| election.start_time);
    let mut finished = in_state(WindowState::Finished);
    finished.sort_by_key(|election| Reverse(election.end_time));
    finished.truncate(RECENTLY_FINISHED);

    Ok(Json(ElectionOverview {
        ongoing: summarize(ongoing),
        upcoming: summarize(upcoming),
        recently_finished: summarize(finished),
    }))
}

#[get("/elections/<election_id>", rank = 1)]
async fn election_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    store: &State<SharedStore>,
) -> Result<Json<ElectionDescription>> {
    describe(store, election_id, true).await
}

#[get("/elections/<election_id>", rank = 2)]
async fn election_non_admin(
    election_id: Id,
    store: &State<SharedStore>,
) -> Result<Json<ElectionDescription>> {
    describe(store, election_id, false).await
}

async fn describe(
    store: &SharedStore,
    election_id: Id,
    is_admin: bool,
) -> Result<Json<ElectionDescription>> {
    let now = Utc::now();
    let election = visible_election(store, election_id, is_admin, now).await?;
    let candidates: Vec<CandidateDescription> = store
        .candidates_for(election.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(ElectionDescription::new(&election, candidates, now)))
}

/// Timing and turnout of an election.
#[get("/elections/<election_id>/status")]
async fn status(
    token: Option<AuthToken<Admin>>,
    election_id: Id,
    store: &State<SharedStore>,
) -> Result<Json<ElectionStatus>> {
    let now = Utc::now();
    let election = visible_election(store, election_id, token.is_some(), now).await?;
    let state = classify(&election, now);

    let seconds_remaining =
        (state == WindowState::Ongoing).then(|| (election.end_time - now).num_seconds());

    Ok(Json(ElectionStatus {
        election_id: election.id.into(),
        state,
        total_votes: store.count_election_votes(election.id).await?,
        seconds_remaining,
    }))
}

#[get("/elections/<election_id>/results")]
async fn results(
    token: Option<AuthToken<Admin>>,
    election_id: Id,
    store: &State<SharedStore>,
) -> Result<Json<TallyReport>> {
    let now = Utc::now();
    let is_admin = token.is_some();
    let election = visible_election(store, election_id, is_admin, now).await?;
    let report = engine::tally(store.inner().as_ref(), &election, now, is_admin).await?;
    Ok(Json(report))
}

/// Every anonymous ballot of an election, for recounting offline.
#[get("/elections/<election_id>/dump")]
async fn dump(
    token: Option<AuthToken<Admin>>,
    election_id: Id,
    store: &State<SharedStore>,
) -> Result<Json<ElectionDump>> {
    let now = Utc::now();
    let is_admin = token.is_some();
    let election = visible_election(store, election_id, is_admin, now).await?;
    let exported = engine::dump(store.inner().as_ref(), &election, now, is_admin).await?;
    Ok(Json(exported))
}
