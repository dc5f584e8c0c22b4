use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

/// One row of the vote ledger. The `email` field carries a unique index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbVote {
    pub email: String,
    pub contestant_id: String,
    pub cast_at: BsonDateTime,
    /// Set once the contestant's counter reflects this vote. A row that is
    /// still uncounted belongs to a vote interrupted part-way through.
    pub counted: bool,
}

impl DbVote {
    pub fn new(email: &str, contestant_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            email: email.to_string(),
            contestant_id: contestant_id.to_string(),
            cast_at: BsonDateTime::from_chrono(now),
            counted: false,
        }
    }
}
