use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ledger::VoterRecord;

/// What a user may currently do. Depends on the clock, so it must be
/// recomputed for every request rather than cached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub is_voting_closed: bool,
    pub can_vote: bool,
    pub can_see_results: bool,
}

impl Eligibility {
    pub fn evaluate(
        now: DateTime<Utc>,
        vote_deadline: Option<DateTime<Utc>>,
        record: &VoterRecord,
        is_admin: bool,
    ) -> Self {
        let is_voting_closed = is_voting_closed(now, vote_deadline);
        Self {
            is_voting_closed,
            can_vote: !record.has_voted && !is_voting_closed,
            can_see_results: record.has_voted || is_admin || is_voting_closed,
        }
    }
}

/// Voting closes strictly after the deadline instant.
pub fn is_voting_closed(now: DateTime<Utc>, vote_deadline: Option<DateTime<Utc>>) -> bool {
    vote_deadline.map_or(false, |deadline| now > deadline)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn no_deadline_never_closes() {
        let flags = Eligibility::evaluate(at(20), None, &VoterRecord::not_voted(), false);
        assert!(!flags.is_voting_closed);
        assert!(flags.can_vote);
        assert!(!flags.can_see_results);
    }

    #[test]
    fn past_deadline_closes_voting() {
        let flags = Eligibility::evaluate(at(2), Some(at(1)), &VoterRecord::not_voted(), false);
        assert!(flags.is_voting_closed);
        assert!(!flags.can_vote);
    }

    #[test]
    fn deadline_instant_itself_is_still_open() {
        assert!(!is_voting_closed(at(1), Some(at(1))));
    }

    #[test]
    fn closed_voting_always_shows_results() {
        for record in [VoterRecord::not_voted(), VoterRecord::voted_for("1")] {
            for is_admin in [false, true] {
                let flags = Eligibility::evaluate(at(2), Some(at(1)), &record, is_admin);
                assert!(flags.can_see_results);
            }
        }
    }

    #[test]
    fn voters_and_admins_see_results_early() {
        let voted = Eligibility::evaluate(at(1), Some(at(2)), &VoterRecord::voted_for("1"), false);
        assert!(voted.can_see_results);
        assert!(!voted.can_vote);

        let admin = Eligibility::evaluate(at(1), Some(at(2)), &VoterRecord::not_voted(), true);
        assert!(admin.can_see_results);
        assert!(admin.can_vote);
    }
}
