use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    serde::json::Json,
    Request,
};

use crate::engine::classify;
use crate::error::{Error, ErrorBody, Result};
use crate::model::{
    api::auth::AuthToken,
    common::WindowState,
    db::{election::Election, voter::Voter},
    mongodb::Id,
};
use crate::store::{ElectionStore, SharedStore, VoterStore};

/// The address a request came from: the first `X-Forwarded-For` entry if
/// there is a valid one, otherwise the peer address.
pub struct ClientAddr(pub Option<IpAddr>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientAddr {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let forwarded = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|header| header.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        Outcome::Success(Self(forwarded.or_else(|| req.client_ip())))
    }
}

/// Respond to anything Rocket rejects itself with the usual JSON error body.
#[catch(default)]
pub fn json_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    (status, Json(ErrorBody::for_status(status)))
}

pub async fn election_by_id(store: &SharedStore, id: Id) -> Result<Election> {
    store
        .election_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {id}")))
}

/// Find an election the caller may look at. Elections that are inactive
/// and unfinished are hidden from everyone but admins.
pub async fn visible_election(
    store: &SharedStore,
    id: Id,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<Election> {
    let election = election_by_id(store, id).await?;
    if !is_admin && classify(&election, now) == WindowState::Inactive {
        return Err(Error::not_found(format!("Election {id}")));
    }
    Ok(election)
}

/// Return a Voter from the store via looking up their token ID.
pub async fn voter_by_token(token: &AuthToken<Voter>, store: &SharedStore) -> Result<Voter> {
    store
        .voter_by_id(token.id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", token.id)))
}
