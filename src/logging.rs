use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::{Backend, SharedBackend};
use crate::model::LoginPolicy;

/// A unique identifier for a particular request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically get the next ID. Wraps around to zero on overflow.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The ID assigned to `req` by [`LoggerFairing`].
    pub fn of(req: &Request<'_>) -> RequestId {
        *req.local_cache(RequestId::next)
    }
}

/// Allow the ID to be accessed via request guard.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(RequestId::of(req))
    }
}

/// A rocket fairing that logs every request and response, tagged with its
/// [`RequestId`].
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Voting endpoint listening on {protocol}://{ip}:{port}");
        info!(
            "{}",
            contest_summary(rocket.state::<SharedBackend>(), rocket.state::<LoginPolicy>())
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = RequestId::of(req);
        let method = req.method();
        let uri = req.uri();
        info!("->req{id} {method} {uri}");
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = RequestId::of(req);
        let code = res.status();
        let route = match req.route() {
            Some(r) => match &r.name {
                Some(name) => format!("{name} ({})", r.uri),
                None => r.uri.to_string(),
            },
            None => "UNKNOWN ROUTE".to_string(),
        };
        let log_msg = format!("<-rsp{id} {code} {route}");
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, finishing votes in flight...");
    }
}

/// One line describing where votes go and who may cast them.
fn contest_summary(backend: Option<&SharedBackend>, policy: Option<&LoginPolicy>) -> String {
    let store = match backend {
        Some(backend) => format!("Recording votes in the {} store", backend.name()),
        None => "No vote store configured".to_string(),
    };
    match policy {
        Some(policy) => format!(
            "{store} for @{} voters, {} admin(s)",
            policy.allowed_domain(),
            policy.admin_count()
        ),
        None => format!("{store}, no login policy configured"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::LocalBackend;

    #[test]
    fn ids_increase() {
        let first = RequestId::next();
        let second = RequestId::next();
        assert!(second > first);
        assert_eq!(format!("{}", RequestId(7)), "7");
    }

    #[test]
    fn summary_names_store_and_voters() {
        let backend: SharedBackend = Arc::new(LocalBackend::in_memory());
        let policy = LoginPolicy::new(["boss@corp.example", "Second@Corp.example"], "@Corp.Example");
        assert_eq!(
            contest_summary(Some(&backend), Some(&policy)),
            "Recording votes in the local store for @corp.example voters, 2 admin(s)"
        );
        assert_eq!(
            contest_summary(None, None),
            "No vote store configured, no login policy configured"
        );
    }
}
