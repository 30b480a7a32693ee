#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

/// Assemble the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// A server backed by `store`, with a fixed test configuration.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: store::SharedStore) -> Rocket<Build> {
    use rocket::figment::Figment;

    let figment = Figment::from(rocket::Config::debug_default())
        .merge(("jwt_secret", "test-secret-not-for-production"))
        .merge(("auth_ttl", 3600))
        .merge(("log_level", "off"));

    rocket::custom(figment)
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
        .manage(store)
}
