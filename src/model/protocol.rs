//! The JSON "action" protocol spoken between clients and the shared voting
//! endpoint. Requests are a flat object tagged by `action`; every reply is an
//! [`ApiResponse`] envelope.

use rocket::serde::json::{serde_json, Value};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

use super::contestant::Contestant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ApiRequest {
    GetContestants {},
    AddContestant {
        contestant: Contestant,
    },
    RemoveContestant {
        id: String,
    },
    Vote {
        email: String,
        #[serde(rename = "contestantId")]
        contestant_id: String,
    },
    GetUserStatus {
        email: String,
    },
    GetSystemConfig {},
    SaveSystemConfig {
        #[serde(rename = "bannerUrl", default)]
        banner_url: String,
        /// Kept as text so the endpoint can report a bad timestamp itself.
        #[serde(rename = "voteDeadline", default)]
        vote_deadline: Option<String>,
    },
    Reset {},
}

impl ApiRequest {
    /// Every action name understood on the wire.
    pub const ACTIONS: [&'static str; 8] = [
        "getContestants",
        "addContestant",
        "removeContestant",
        "vote",
        "getUserStatus",
        "getSystemConfig",
        "saveSystemConfig",
        "reset",
    ];

    /// The action name as it appears on the wire, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetContestants {} => "getContestants",
            Self::AddContestant { .. } => "addContestant",
            Self::RemoveContestant { .. } => "removeContestant",
            Self::Vote { .. } => "vote",
            Self::GetUserStatus { .. } => "getUserStatus",
            Self::GetSystemConfig {} => "getSystemConfig",
            Self::SaveSystemConfig { .. } => "saveSystemConfig",
            Self::Reset {} => "reset",
        }
    }
}

/// Reply envelope for every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            data: Value::Null,
        }
    }

    pub fn with_data<T: Serialize>(data: &T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(data)?,
            ..Self::ok()
        })
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: Value::Null,
        }
    }

    /// Turn a failed reply into an error, passing the endpoint's message on
    /// verbatim.
    pub fn into_result(self) -> Result<Value> {
        if self.success {
            Ok(self.data)
        } else {
            Err(Error::Remote(
                self.message.unwrap_or_else(|| "API Error".to_string()),
            ))
        }
    }

    /// Decode the payload of a successful reply.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.into_result()?)?)
    }
}

impl From<Error> for ApiResponse {
    fn from(err: Error) -> Self {
        Self::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::json;

    use super::*;

    #[test]
    fn requests_are_flat_objects_tagged_by_action() {
        let vote = ApiRequest::Vote {
            email: "a@gmail.com".to_string(),
            contestant_id: "2".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&vote).unwrap(),
            json!({ "action": "vote", "email": "a@gmail.com", "contestantId": "2" })
        );
        assert_eq!(
            serde_json::to_value(ApiRequest::Reset {}).unwrap(),
            json!({ "action": "reset" })
        );
    }

    #[test]
    fn unknown_fields_and_actions() {
        let request: ApiRequest =
            serde_json::from_value(json!({ "action": "getContestants", "extra": 1 })).unwrap();
        assert_eq!(request, ApiRequest::GetContestants {});
        assert_eq!(request.action(), "getContestants");

        let unknown: std::result::Result<ApiRequest, _> =
            serde_json::from_value(json!({ "action": "dropTables" }));
        assert!(unknown.is_err());
    }

    #[test]
    fn failed_reply_carries_message() {
        let reply: ApiResponse =
            serde_json::from_value(json!({ "success": false, "message": "closed" })).unwrap();
        match reply.into_result() {
            Err(Error::Remote(message)) => assert_eq!(message, "closed"),
            other => panic!("unexpected {other:?}"),
        }

        let bare: ApiResponse = serde_json::from_value(json!({ "success": false })).unwrap();
        assert!(matches!(bare.into_result(), Err(Error::Remote(m)) if m == "API Error"));
    }

    #[test]
    fn successful_reply_decodes_data() {
        let reply: ApiResponse = serde_json::from_value(json!({
            "success": true,
            "data": { "hasVoted": true, "votedForId": "3" },
        }))
        .unwrap();
        let record: crate::model::ledger::VoterRecord = reply.into_data().unwrap();
        assert_eq!(record.voted_for_id.as_deref(), Some("3"));
    }
}
