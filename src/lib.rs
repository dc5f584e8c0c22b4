#[macro_use]
extern crate rocket;

use rocket::{Build, Rocket};

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;

use backend::SharedBackend;
use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use model::LoginPolicy;

/// The voting endpoint, backed by the MongoDB database named in the config.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .mount("/", api::routes())
}

/// The voting endpoint over an already constructed backend.
pub fn build_with_backend(backend: SharedBackend, policy: LoginPolicy) -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .manage(backend)
        .manage(policy)
        .mount("/", api::routes())
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::net::{Ipv4Addr, TcpListener};
    use std::path::{Path, PathBuf};

    use rocket::{config::LogLevel, fairing::AdHoc, tokio, Build, Rocket};

    /// Launch `rocket` on a free local port and return its base URL once it
    /// is accepting connections. The server stops with the test's runtime.
    pub async fn serve(rocket: Rocket<Build>) -> String {
        let port = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .and_then(|listener| listener.local_addr())
            .unwrap()
            .port();
        let config = rocket::Config {
            address: Ipv4Addr::LOCALHOST.into(),
            port,
            log_level: LogLevel::Off,
            ..rocket::Config::debug_default()
        };
        let (ready, started) = tokio::sync::oneshot::channel();
        let rocket = rocket.configure(config).attach(AdHoc::on_liftoff(
            "Test readiness",
            move |_| {
                Box::pin(async move {
                    let _ = ready.send(());
                })
            },
        ));
        tokio::spawn(rocket.launch());
        started.await.unwrap();
        format!("http://127.0.0.1:{port}/")
    }

    /// A uniquely named directory under the system temp dir, removed on drop.
    /// Not created until something writes to it.
    pub struct TempDir(PathBuf);

    impl TempDir {
        pub fn new() -> Self {
            let random: u32 = rand::random();
            Self(std::env::temp_dir().join(format!("votehub-test{random}")))
        }

        pub fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
}
