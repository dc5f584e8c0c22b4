//! The shared voting endpoint: one URL speaking the JSON action protocol.
//!
//! Every reply is an HTTP 200 carrying an [`ApiResponse`]; failures are
//! reported in the envelope, never through the status code.

use chrono::{DateTime, Utc};
use rocket::{
    serde::json::{serde_json, Json, Value},
    Route, State,
};

use crate::backend::{Backend, SharedBackend};
use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    protocol::{ApiRequest, ApiResponse},
    system_config::parse_deadline,
    LoginPolicy, SystemConfig,
};

pub fn routes() -> Vec<Route> {
    routes![dispatch, list_contestants]
}

/// The request body is read as text whatever its `Content-Type`, since
/// browser clients send JSON as `text/plain` to avoid a CORS preflight.
#[post("/", data = "<body>")]
async fn dispatch(
    id: RequestId,
    body: String,
    backend: &State<SharedBackend>,
    policy: &State<LoginPolicy>,
) -> Json<ApiResponse> {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(message) => {
            warn!("req{id} rejected: {message}");
            return Json(ApiResponse::failure(message));
        }
    };
    let action = request.action();
    debug!("req{id} action {action}");
    match handle(request, backend.inner().as_ref(), policy, Utc::now()).await {
        Ok(response) => Json(response),
        Err(e) => {
            warn!("req{id} {action} failed: {e}");
            Json(e.into())
        }
    }
}

#[get("/")]
async fn list_contestants(backend: &State<SharedBackend>) -> Json<ApiResponse> {
    let response = backend
        .contestants()
        .await
        .and_then(|contestants| ApiResponse::with_data(&contestants));
    Json(response.unwrap_or_else(ApiResponse::from))
}

fn parse_request(body: &str) -> std::result::Result<ApiRequest, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("Invalid JSON: {e}"))?;
    let action = match value.get("action").and_then(Value::as_str) {
        Some(action) => action.to_string(),
        None => return Err("Missing action".to_string()),
    };
    if !ApiRequest::ACTIONS.contains(&action.as_str()) {
        return Err(format!("Unknown action: {action}"));
    }
    serde_json::from_value(value).map_err(|e| format!("Invalid {action} request: {e}"))
}

async fn handle(
    request: ApiRequest,
    backend: &dyn Backend,
    policy: &LoginPolicy,
    now: DateTime<Utc>,
) -> Result<ApiResponse> {
    match request {
        ApiRequest::GetContestants {} => ApiResponse::with_data(&backend.contestants().await?),
        ApiRequest::AddContestant { mut contestant } => {
            if contestant.id.trim().is_empty() || contestant.name.trim().is_empty() {
                return Err(Error::BadRequest(
                    "A contestant needs an ID and a name".to_string(),
                ));
            }
            // Counters only move through votes.
            if contestant.votes != 0 {
                warn!(
                    "Ignoring {} votes submitted with new contestant {}",
                    contestant.votes, contestant.id
                );
                contestant.votes = 0;
            }
            info!("Adding contestant {} ({})", contestant.id, contestant.name);
            backend.add_contestant(contestant).await?;
            Ok(ApiResponse::ok())
        }
        ApiRequest::RemoveContestant { id } => {
            backend.remove_contestant(&id).await?;
            Ok(ApiResponse::ok())
        }
        ApiRequest::Vote {
            email,
            contestant_id,
        } => {
            let (email, _) = policy.admit(&email)?;
            backend.cast_vote(&email, &contestant_id, now).await?;
            Ok(ApiResponse::ok())
        }
        ApiRequest::GetUserStatus { email } => {
            let (email, _) = policy.admit(&email)?;
            ApiResponse::with_data(&backend.vote_status(&email).await?)
        }
        ApiRequest::GetSystemConfig {} => ApiResponse::with_data(&backend.system_config().await?),
        ApiRequest::SaveSystemConfig {
            banner_url,
            vote_deadline,
        } => {
            let deadline = match vote_deadline {
                Some(text) => parse_deadline(&text).map_err(Error::BadRequest)?,
                None => None,
            };
            let config = SystemConfig::new(banner_url.trim(), deadline);
            backend.save_system_config(&config).await?;
            info!("Saved settings: deadline {:?}", config.vote_deadline);
            Ok(ApiResponse::ok())
        }
        ApiRequest::Reset {} => {
            backend.reset().await?;
            Ok(ApiResponse::ok())
        }
    }
}
