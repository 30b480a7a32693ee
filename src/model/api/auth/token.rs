use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::{debug, error};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::mongodb::Id;
use crate::store::{AdminStore, SharedStore, VoterStore};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into a signed cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>, Error> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type, and that the user still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (Outcome::Success(config), Outcome::Success(store)) = (
            req.guard::<&State<Config>>().await,
            req.guard::<&State<SharedStore>>().await,
        ) else {
            error!("Authentication attempted without managed config and store");
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(Status::InternalServerError, "Server misconfigured".to_string()),
            ));
        };

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));

        // Decode the token.
        let token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Ignoring invalid auth token: {e}");
                return Outcome::Forward(());
            }
        };

        // Check it represents the correct rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(());
        }

        // Check the user actually exists.
        let exists = match token.rights {
            Rights::Voter => store.voter_by_id(token.id).await.map(|v| v.is_some()),
            Rights::Admin => store.admin_by_id(token.id).await.map(|a| a.is_some()),
        };
        match exists {
            Ok(true) => Outcome::Success(token),
            Ok(false) => Outcome::Forward(()),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;
    use crate::model::db::{admin::Admin, voter::Voter};

    fn config(secret: &str) -> Config {
        Figment::new()
            .merge(("jwt_secret", secret))
            .merge(("auth_ttl", 60))
            .extract()
            .unwrap()
    }

    #[test]
    fn cookie_round_trip_keeps_rights() {
        let config = config("an appropriately long secret");
        let id = Id::new();
        let token = AuthToken::<Voter> {
            id,
            rights: Rights::Voter,
            phantom: PhantomData,
        };
        let cookie = token.into_cookie(&config).unwrap();
        assert!(cookie.http_only().unwrap_or(false));

        let decoded = AuthToken::<Admin>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(decoded.id, id);
        assert!(decoded.permits(Rights::Voter));
        assert!(!decoded.permits(Rights::Admin));
    }

    #[test]
    fn cookie_from_another_secret_is_rejected() {
        let token = AuthToken::<Admin> {
            id: Id::new(),
            rights: Rights::Admin,
            phantom: PhantomData,
        };
        let cookie = token.into_cookie(&config("one secret")).unwrap();
        assert!(AuthToken::<Admin>::from_cookie(&cookie, &config("another secret")).is_err());
    }
}
