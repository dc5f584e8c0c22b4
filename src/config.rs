use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::backend::{MongoBackend, SharedBackend};
use crate::model::{
    mongodb::ensure_indexes_exist,
    user::{DEFAULT_ADMIN_EMAIL, DEFAULT_EMAIL_DOMAIN},
    LoginPolicy,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state, along with the
/// [`LoginPolicy`] built from it.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_admin_emails")]
    admin_emails: Vec<String>,
    #[serde(default = "default_email_domain")]
    allowed_email_domain: String,
}

fn default_admin_emails() -> Vec<String> {
    vec![DEFAULT_ADMIN_EMAIL.to_string()]
}

fn default_email_domain() -> String {
    DEFAULT_EMAIL_DOMAIN.to_string()
}

impl Config {
    /// Addresses that log in as administrators.
    pub fn admin_emails(&self) -> &[String] {
        &self.admin_emails
    }

    /// The domain every non-admin address must belong to.
    pub fn allowed_email_domain(&self) -> &str {
        &self.allowed_email_domain
    }

    pub fn login_policy(&self) -> LoginPolicy {
        LoginPolicy::new(&self.admin_emails, &self.allowed_email_domain)
    }
}

/// A fairing that loads the application config and puts it in managed state.
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
        info!(
            "Admins: {}; voters must use @{}",
            config.admin_emails().join(", "),
            config.allowed_email_domain()
        );

        // Manage the state.
        let policy = config.login_policy();
        rocket = rocket.manage(config).manage(policy);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database, makes
/// sure the indexes exist, and places the `Client`, the `Database` and a
/// [`SharedBackend`] over it into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let backend: SharedBackend = Arc::new(MongoBackend::new(&db));
        rocket = rocket.manage(client).manage(db).manage(backend);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "votehub".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(config.admin_emails(), [DEFAULT_ADMIN_EMAIL]);
        assert_eq!(config.allowed_email_domain(), "gmail.com");
        assert_eq!(config.login_policy(), LoginPolicy::default());
    }

    #[test]
    fn configured_admins_are_normalized() {
        let config: Config = Figment::new()
            .merge(("admin_emails", [" Boss@Example.ORG "]))
            .merge(("allowed_email_domain", "example.org"))
            .extract()
            .unwrap();
        let policy = config.login_policy();
        assert!(policy.is_admin("boss@example.org"));
        assert_eq!(
            policy.admit("someone@example.org").unwrap(),
            ("someone@example.org".to_string(), false)
        );
        assert!(policy.admit("someone@gmail.com").is_err());
    }
}
