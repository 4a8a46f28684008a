use std::cmp::Reverse;

use serde::Serialize;

use crate::models::{ElectionType, NomineeTally, TallyCounts};

/// The two presentation views derived from one tally fetch.
///
/// `chart` keeps the fetch order so bars do not jump around between
/// refreshes; `leaderboard` is ordered by the election's winning semantic.
/// The variants keep vote counts and rank scores apart: the two are not
/// numerically comparable, so a `Rank` event never yields a vote view and
/// vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TallyBoard {
    /// Plurality and multi-select: higher vote count wins.
    Votes {
        chart: Vec<NomineeTally>,
        leaderboard: Vec<NomineeTally>,
    },
    /// Ranked: lower score wins.
    Ranks {
        chart: Vec<NomineeTally>,
        leaderboard: Vec<NomineeTally>,
    },
}

impl TallyBoard {
    pub fn build(election_type: ElectionType, counts: TallyCounts) -> Self {
        match election_type {
            ElectionType::Single | ElectionType::MultiVote => {
                let chart = counts.vote_counts.clone();
                let mut leaderboard = counts.vote_counts;
                // Stable sort: ties keep their fetch order, there is no
                // secondary key to break them with.
                leaderboard.sort_by_key(|t| Reverse(t.tally));
                TallyBoard::Votes { chart, leaderboard }
            }
            ElectionType::Rank => {
                let chart = counts.rank_scores.clone();
                let mut leaderboard = counts.rank_scores;
                leaderboard.sort_by_key(|t| t.tally);
                TallyBoard::Ranks { chart, leaderboard }
            }
        }
    }

    pub fn chart(&self) -> &[NomineeTally] {
        match self {
            TallyBoard::Votes { chart, .. } | TallyBoard::Ranks { chart, .. } => chart,
        }
    }

    pub fn leaderboard(&self) -> &[NomineeTally] {
        match self {
            TallyBoard::Votes { leaderboard, .. } | TallyBoard::Ranks { leaderboard, .. } => {
                leaderboard
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tally(name: &str, value: i64) -> NomineeTally {
        NomineeTally {
            nominee_id: Uuid::new_v4(),
            name: name.to_string(),
            tally: value,
        }
    }

    fn names(entries: &[NomineeTally]) -> Vec<&str> {
        entries.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn vote_leaderboard_descends_with_stable_ties() {
        let counts = TallyCounts {
            vote_counts: vec![tally("A", 10), tally("B", 30), tally("C", 30)],
            rank_scores: vec![],
        };
        let board = TallyBoard::build(ElectionType::Single, counts);
        // B and C tie at 30; B was fetched first so B stays first.
        assert_eq!(names(board.leaderboard()), ["B", "C", "A"]);
    }

    #[test]
    fn rank_leaderboard_ascends_with_stable_ties() {
        let counts = TallyCounts {
            vote_counts: vec![],
            rank_scores: vec![tally("A", 3), tally("B", 1), tally("C", 1)],
        };
        let board = TallyBoard::build(ElectionType::Rank, counts);
        assert_eq!(names(board.leaderboard()), ["B", "C", "A"]);
    }

    #[test]
    fn chart_preserves_fetch_order() {
        let counts = TallyCounts {
            vote_counts: vec![tally("A", 1), tally("B", 50), tally("C", 7)],
            rank_scores: vec![],
        };
        let board = TallyBoard::build(ElectionType::MultiVote, counts);
        assert_eq!(names(board.chart()), ["A", "B", "C"]);
    }

    #[test]
    fn rank_events_never_read_the_vote_list() {
        let counts = TallyCounts {
            vote_counts: vec![tally("bogus", 999)],
            rank_scores: vec![tally("A", 2), tally("B", 1)],
        };
        match TallyBoard::build(ElectionType::Rank, counts) {
            TallyBoard::Ranks { chart, leaderboard } => {
                assert_eq!(chart.len(), 2);
                assert_eq!(leaderboard[0].name, "B");
            }
            TallyBoard::Votes { .. } => panic!("rank event produced a vote board"),
        }
    }
}
