use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client};
use rocket::serde::json::serde_json;

use crate::error::Result;
use crate::model::{
    protocol::{ApiRequest, ApiResponse},
    system_config::format_deadline,
    Contestant, SystemConfig, VoterRecord,
};

use super::Backend;

/// How long to wait for the endpoint before giving up on a request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A backend that forwards every operation to a shared endpoint speaking the
/// JSON action protocol.
///
/// The endpoint is the authority on the vote deadline and on one vote per
/// email; this side performs no checks of its own.
#[derive(Debug)]
pub struct RemoteBackend {
    url: String,
    client: Client,
}

impl RemoteBackend {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one action and unwrap the reply envelope.
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let action = request.action();
        debug!("-> {action} {}", self.url);
        // Sent as plain text: script-hosted endpoints reject the CORS
        // preflight a JSON content type would trigger.
        let body = serde_json::to_string(&request)?;
        let text = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let response: ApiResponse = serde_json::from_str(&text).map_err(|e| {
            warn!("<- {action}: undecodable reply: {e}");
            e
        })?;
        if !response.success {
            warn!(
                "<- {action} failed: {}",
                response.message.as_deref().unwrap_or("no message")
            );
        }
        Ok(response)
    }

    async fn send(&self, request: ApiRequest) -> Result<()> {
        self.request(request).await?.into_result().map(|_| ())
    }
}

#[rocket::async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn contestants(&self) -> Result<Vec<Contestant>> {
        self.request(ApiRequest::GetContestants {})
            .await?
            .into_data()
    }

    async fn add_contestant(&self, contestant: Contestant) -> Result<()> {
        self.send(ApiRequest::AddContestant { contestant }).await
    }

    async fn remove_contestant(&self, id: &str) -> Result<()> {
        self.send(ApiRequest::RemoveContestant { id: id.to_string() })
            .await
    }

    async fn cast_vote(
        &self,
        email: &str,
        contestant_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<()> {
        self.send(ApiRequest::Vote {
            email: email.to_string(),
            contestant_id: contestant_id.to_string(),
        })
        .await
    }

    async fn vote_status(&self, email: &str) -> Result<VoterRecord> {
        self.request(ApiRequest::GetUserStatus {
            email: email.to_string(),
        })
        .await?
        .into_data()
    }

    async fn system_config(&self) -> Result<SystemConfig> {
        self.request(ApiRequest::GetSystemConfig {})
            .await?
            .into_data()
    }

    async fn save_system_config(&self, config: &SystemConfig) -> Result<()> {
        self.send(ApiRequest::SaveSystemConfig {
            banner_url: config.banner_url.clone(),
            vote_deadline: config.vote_deadline.map(format_deadline),
        })
        .await
    }

    async fn reset(&self) -> Result<()> {
        self.send(ApiRequest::Reset {}).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::backend::{LocalBackend, SharedBackend, Storage};
    use crate::error::Error;
    use crate::model::{contestant::seed_contestants, LoginPolicy};
    use crate::session::Session;
    use crate::test_util::serve;

    /// A running endpoint over a fresh in-memory store.
    async fn live_endpoint() -> (Arc<LocalBackend>, String) {
        let store = Arc::new(LocalBackend::in_memory());
        let backend: SharedBackend = store.clone();
        let url = serve(crate::build_with_backend(backend, LoginPolicy::default())).await;
        (store, url)
    }

    /// Nothing listens on the discard port in test environments.
    const UNREACHABLE: &str = "http://127.0.0.1:9/exec";

    #[rocket::async_test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let backend = RemoteBackend::new(UNREACHABLE).unwrap();
        assert!(matches!(backend.contestants().await, Err(Error::Http(_))));
        assert!(matches!(
            backend.cast_vote("a@gmail.com", "1", Utc::now()).await,
            Err(Error::Http(_))
        ));
    }

    #[rocket::async_test]
    async fn round_trip_against_live_endpoint() {
        let (store, url) = live_endpoint().await;
        let backend = RemoteBackend::new(url).unwrap();

        assert_eq!(backend.contestants().await.unwrap(), seed_contestants());
        assert_eq!(backend.system_config().await.unwrap(), SystemConfig::default());

        let deadline = Utc.with_ymd_and_hms(2030, 5, 1, 17, 0, 0).unwrap();
        let config = SystemConfig::new("https://example.com/banner.png", Some(deadline));
        backend.save_system_config(&config).await.unwrap();
        assert_eq!(backend.system_config().await.unwrap(), config);

        backend
            .cast_vote("a@gmail.com", "2", Utc::now())
            .await
            .unwrap();
        assert_eq!(
            backend.vote_status("a@gmail.com").await.unwrap(),
            VoterRecord::voted_for("2")
        );
        // The endpoint's store is the one that changed.
        assert_eq!(
            store.vote_status("a@gmail.com").await.unwrap(),
            VoterRecord::voted_for("2")
        );
    }

    #[rocket::async_test]
    async fn refused_vote_reaches_session_unchanged() {
        let (_, url) = live_endpoint().await;
        let storage = Storage::remote(LocalBackend::in_memory(), RemoteBackend::new(url).unwrap());
        let session = Session::login(Arc::new(storage), &LoginPolicy::default(), "a@gmail.com")
            .await
            .unwrap();

        match session.vote("nope", Utc::now()).await {
            Err(Error::Remote(message)) => assert_eq!(message, "Not found: Contestant nope"),
            other => panic!("expected the endpoint's refusal, got {other:?}"),
        }
        assert!(!session.user().record.has_voted);
    }
}
