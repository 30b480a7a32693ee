use chrono::Utc;
use log::info;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    api::common::ClientAddr,
    config::Config,
    engine::manage,
    error::{Error, Result},
    model::api::{
        admin::{AdminCredentials, AdminDescription},
        auth::{AuthToken, AUTH_TOKEN_COOKIE},
        voter::{VoterCredentials, VoterProfile, VoterRegistration},
    },
    store::{AdminStore, SharedStore, VoterStore},
};

pub fn routes() -> Vec<Route> {
    routes![register_voter, authenticate_voter, authenticate_admin, logout]
}

/// Register a new voter and log them in.
#[post("/voters", data = "<registration>", format = "json")]
pub async fn register_voter(
    cookies: &CookieJar<'_>,
    registration: Json<VoterRegistration>,
    addr: ClientAddr,
    store: &State<SharedStore>,
    config: &State<Config>,
) -> Result<Json<VoterProfile>> {
    let voter =
        manage::register_voter(store.inner().as_ref(), registration.0, Utc::now(), addr.0).await?;

    cookies.add(AuthToken::new(&voter).into_cookie(config)?);

    Ok(Json(voter.into()))
}

#[post("/auth/voter", data = "<credentials>", format = "json")]
pub async fn authenticate_voter(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    store: &State<SharedStore>,
    config: &State<Config>,
) -> Result<Json<VoterProfile>> {
    let voter = store
        .voter_by_username(&credentials.username)
        .await?
        .filter(|voter| voter.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized(
                "No voter found with the provided username and password combination.",
            )
        })?;

    cookies.add(AuthToken::new(&voter).into_cookie(config)?);
    info!("Voter {} logged in", voter.id);

    Ok(Json(voter.into()))
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate_admin(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    store: &State<SharedStore>,
    config: &State<Config>,
) -> Result<Json<AdminDescription>> {
    let admin = store
        .admin_by_username(&credentials.username)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized(
                "No admin found with the provided username and password combination.",
            )
        })?;

    cookies.add(AuthToken::new(&admin).into_cookie(config)?);
    info!("Admin {} logged in", admin.username);

    Ok(Json(admin.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rocket::{local::asynchronous::Client, serde::json::serde_json::json};

    use super::*;
    use crate::api::common::test_helpers::{error_kind, post_json, read_json};
    use crate::model::db::admin::NewAdmin;

    #[backend_test]
    async fn admin_authenticate_valid(client: Client, store: SharedStore) {
        // Ensure there is an admin to login as
        store.insert_admin(NewAdmin::example()).await.unwrap();

        let credentials = AdminCredentials::example1();
        let response = post_json(&client, uri!(authenticate_admin), &credentials).await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let admin: AdminDescription = read_json(response).await;
        assert_eq!(admin.username, NewAdmin::example().username);
    }

    #[backend_test]
    async fn admin_authenticate_invalid(client: Client, store: SharedStore) {
        store.insert_admin(NewAdmin::example()).await.unwrap();

        // Unknown username
        let credentials = AdminCredentials::empty();
        let response = post_json(&client, uri!(authenticate_admin), &credentials).await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Wrong password
        let credentials = json!({
            "username": &NewAdmin::example().username,
            "password": "",
        });
        let response = post_json(&client, uri!(authenticate_admin), &credentials).await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn voter_register_and_login(client: Client, store: SharedStore) {
        let registration = VoterRegistration::example();
        let response = post_json(&client, uri!(register_voter), &registration).await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
        let profile: VoterProfile = read_json(response).await;
        assert_eq!(profile.username, registration.username);
        assert!(profile.is_eligible);

        // The password is only kept hashed.
        let voter = store
            .voter_by_username(&registration.username)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(voter.password_hash, registration.password);

        client.delete(uri!(logout)).dispatch().await;
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let response =
            post_json(&client, uri!(authenticate_voter), &VoterCredentials::example()).await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn voter_authenticate_invalid(client: Client) {
        post_json(&client, uri!(register_voter), &VoterRegistration::example()).await;
        client.delete(uri!(logout)).dispatch().await;

        let credentials = VoterCredentials {
            password: "not-the-password".to_string(),
            ..VoterCredentials::example()
        };
        let response = post_json(&client, uri!(authenticate_voter), &credentials).await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn duplicate_registrations(client: Client) {
        let registration = VoterRegistration::example();
        let response = post_json(&client, uri!(register_voter), &registration).await;
        assert_eq!(Status::Ok, response.status());

        // Same username
        let registration = VoterRegistration {
            voter_id: "V-9999".to_string(),
            ..VoterRegistration::example()
        };
        let response = post_json(&client, uri!(register_voter), &registration).await;
        assert_eq!(Status::Conflict, response.status());

        // Same voter ID
        let registration = VoterRegistration {
            voter_id: VoterRegistration::example().voter_id,
            ..VoterRegistration::example2()
        };
        let response = post_json(&client, uri!(register_voter), &registration).await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test]
    async fn underage_registration(client: Client) {
        let registration = VoterRegistration {
            date_of_birth: Utc::now().date_naive(),
            ..VoterRegistration::example()
        };
        let response = post_json(&client, uri!(register_voter), &registration).await;

        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(error_kind(response).await, "BadRequest");
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let registration = VoterRegistration {
            date_of_birth: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap(),
            password: "short".to_string(),
            ..VoterRegistration::example()
        };
        let response = post_json(&client, uri!(register_voter), &registration).await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(voter)]
    async fn logout_voter(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
