use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The ledger entry for one voter.
///
/// Voters with no entry are reported as [`VoterRecord::not_voted`]. Once an
/// entry with `has_voted` exists it is never changed again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterRecord {
    pub has_voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voted_for_id: Option<String>,
}

impl VoterRecord {
    pub fn not_voted() -> Self {
        Self::default()
    }

    pub fn voted_for(contestant_id: impl Into<String>) -> Self {
        Self {
            has_voted: true,
            voted_for_id: Some(contestant_id.into()),
        }
    }
}

/// Ledger of every voter, keyed by normalized email.
pub type Ledger = HashMap<String, VoterRecord>;

/// Normalize an email for use as a ledger key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{serde_json, serde_json::json};

    use super::*;

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Gmail.COM "), "alice@gmail.com");
    }

    #[test]
    fn unvoted_record_omits_choice() {
        let value = serde_json::to_value(VoterRecord::not_voted()).unwrap();
        assert_eq!(value, json!({ "hasVoted": false }));

        let value = serde_json::to_value(VoterRecord::voted_for("2")).unwrap();
        assert_eq!(value, json!({ "hasVoted": true, "votedForId": "2" }));
    }
}
