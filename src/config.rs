use std::sync::Arc;

use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::engine::manage::bootstrap_admin;
use crate::model::api::admin::AdminCredentials;
use crate::store::{AdminStore, MemoryStore, MongoStore, SharedStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with [`StoreFairing`] and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which store backs the application.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Everything is lost on shutdown. For development.
    #[default]
    Memory,
    Mongodb,
}

fn default_db_name() -> String {
    "ballot".to_string()
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    #[serde(default = "default_db_name")]
    db_name: String,
    admin_username: Option<String>,
    // secrets
    db_uri: Option<String>,
    admin_password: Option<String>,
}

/// A fairing that loads the store config, connects to the database if there
/// is one, ensures an admin can log in, and places a [`SharedStore`] into
/// managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: SharedStore = match config.store {
            StoreKind::Memory => {
                warn!("Using the in-memory store, nothing will be persisted");
                Arc::new(MemoryStore::new())
            }
            StoreKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set to use the MongoDB store");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&db_uri, &config.db_name).await {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Ensure there is at least one admin user.
        match (config.admin_username, config.admin_password) {
            (Some(username), Some(password)) => {
                let credentials = AdminCredentials { username, password };
                if let Err(e) = bootstrap_admin(&*store, credentials).await {
                    error!("Failed to create initial admin: {e}");
                    return Err(rocket);
                }
            }
            _ => match store.admins().await {
                Ok(admins) if admins.is_empty() => {
                    warn!(
                        "No admins exist; set `admin_username` and `admin_password` to create one"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Failed to query admins: {e}");
                    return Err(rocket);
                }
            },
        }
        info!("...store online!");

        // Manage the state.
        Ok(rocket.manage(store))
    }
}
