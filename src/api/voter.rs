use chrono::Utc;
use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    api::common::{election_by_id, visible_election, voter_by_token, ClientAddr},
    engine::{admit_vote, classify, manage},
    error::{Error, Result},
    logging::RequestId,
    model::{
        api::{
            auth::AuthToken,
            vote::{VoteReceipt, VoteRequest, VoterBallotStatus},
            voter::{ProfileUpdate, VoterProfile},
        },
        common::WindowState,
        db::voter::Voter,
        mongodb::Id,
    },
    store::{ElectionStore, SharedStore, VoteStore},
};

pub fn routes() -> Vec<Route> {
    routes![profile, update_profile, voting_history, ballot_status, cast_vote]
}

#[get("/voter/profile")]
async fn profile(
    token: AuthToken<Voter>,
    store: &State<SharedStore>,
) -> Result<Json<VoterProfile>> {
    let voter = voter_by_token(&token, store).await?;
    Ok(Json(voter.into()))
}

#[put("/voter/profile", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken<Voter>,
    update: Json<ProfileUpdate>,
    addr: ClientAddr,
    store: &State<SharedStore>,
) -> Result<Json<VoterProfile>> {
    let voter = manage::update_profile(
        store.inner().as_ref(),
        token.id,
        update.0,
        Utc::now(),
        addr.0,
    )
    .await?;
    Ok(Json(voter.into()))
}

/// Every vote the logged in voter has cast, newest first.
#[get("/voter/votes")]
async fn voting_history(
    token: AuthToken<Voter>,
    store: &State<SharedStore>,
) -> Result<Json<Vec<VoteReceipt>>> {
    let votes = store.votes_by_voter(token.id).await?;
    Ok(Json(votes.into_iter().map(Into::into).collect()))
}

/// Whether the logged in voter may vote in an election, and their vote if
/// they already have.
#[get("/voter/elections/<election_id>/vote")]
async fn ballot_status(
    token: AuthToken<Voter>,
    election_id: Id,
    store: &State<SharedStore>,
) -> Result<Json<VoterBallotStatus>> {
    let now = Utc::now();
    let voter = voter_by_token(&token, store).await?;
    let election = visible_election(store, election_id, false, now).await?;

    let state = classify(&election, now);
    let vote = store.vote_by_voter(voter.id, election.id).await?;

    Ok(Json(VoterBallotStatus {
        election_id: election.id.into(),
        state,
        can_vote: state == WindowState::Ongoing && voter.is_eligible && vote.is_none(),
        vote: vote.map(Into::into),
    }))
}

#[post("/voter/elections/<election_id>/vote", data = "<choice>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    choice: Json<VoteRequest>,
    addr: ClientAddr,
    request_id: &RequestId,
    store: &State<SharedStore>,
) -> Result<Json<VoteReceipt>> {
    let voter = voter_by_token(&token, store).await?;
    let election = election_by_id(store, election_id).await?;
    let candidate = store
        .candidate_by_id(*choice.candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {}", choice.candidate_id)))?;

    let vote = admit_vote(
        store.inner().as_ref(),
        &voter,
        &election,
        &candidate,
        Utc::now(),
        addr.0,
    )
    .await
    .map_err(|e| {
        info!("req{request_id}: vote by {} in {election_id} refused: {e}", voter.id);
        e
    })?;

    Ok(Json(vote.into()))
}
