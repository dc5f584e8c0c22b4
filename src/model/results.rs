use serde::Serialize;

use super::contestant::Contestant;

/// Sum of every contestant's votes.
pub fn total_votes(contestants: &[Contestant]) -> u64 {
    contestants.iter().map(|c| c.votes).sum()
}

/// Percentage of `total` held by `votes`, or zero when nobody has voted.
pub fn vote_share(votes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        votes as f64 / total as f64 * 100.0
    }
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub rank: usize,
    #[serde(flatten)]
    pub contestant: Contestant,
    pub share: f64,
}

/// Contestants ordered by votes, highest first. Ties keep their listing order
/// and share the better rank.
pub fn standings(contestants: &[Contestant]) -> Vec<Standing> {
    let total = total_votes(contestants);
    let mut sorted = contestants.to_vec();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes));

    let mut standings: Vec<Standing> = Vec::with_capacity(sorted.len());
    for (index, contestant) in sorted.into_iter().enumerate() {
        let rank = match standings.last() {
            Some(prev) if prev.contestant.votes == contestant.votes => prev.rank,
            _ => index + 1,
        };
        let share = vote_share(contestant.votes, total);
        standings.push(Standing {
            rank,
            contestant,
            share,
        });
    }
    standings
}
