use serde::{Deserialize, Serialize};

use crate::model::contestant::Contestant;

/// A contestant as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbContestant {
    #[serde(rename = "_id")]
    pub id: String,
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub votes: i64,
    /// Emails whose vote has already been added to `votes`. The counter is
    /// only ever incremented together with a push to this list, which makes
    /// the increment idempotent per voter.
    #[serde(default)]
    pub voters: Vec<String>,
}

impl From<Contestant> for DbContestant {
    fn from(contestant: Contestant) -> Self {
        Self {
            id: contestant.id,
            number: contestant.number,
            name: contestant.name,
            department: contestant.department,
            image_url: contestant.image_url,
            votes: i64::try_from(contestant.votes).unwrap_or(i64::MAX),
            voters: Vec::new(),
        }
    }
}

impl From<DbContestant> for Contestant {
    fn from(contestant: DbContestant) -> Self {
        Self {
            id: contestant.id,
            number: contestant.number,
            name: contestant.name,
            department: contestant.department,
            image_url: contestant.image_url,
            votes: u64::try_from(contestant.votes).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voter_list_is_not_exposed() {
        let mut db: DbContestant = Contestant::example("5", 2).into();
        assert!(db.voters.is_empty());
        db.voters.push("a@gmail.com".to_string());
        db.votes = 3;

        let contestant: Contestant = db.into();
        assert_eq!(contestant, Contestant::example("5", 3));
    }
}
