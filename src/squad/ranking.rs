use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::domain::Candidate;

/// Ranking strategies for the greedy walk. The starting XI alternates
/// between the two; the bench uses value only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Points,
    Value,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Points => write!(f, "points"),
            Self::Value => write!(f, "value"),
        }
    }
}

/// Descending predicted points; ties by descending cost, then descending
/// team id, then descending player id. A total order, so ranked output is
/// reproducible bit for bit.
pub fn by_points(a: &Candidate, b: &Candidate) -> Ordering {
    b.predicted_points
        .total_cmp(&a.predicted_points)
        .then_with(|| b.now_cost.cmp(&a.now_cost))
        .then_with(|| b.team_id.cmp(&a.team_id))
        .then_with(|| b.player_id.cmp(&a.player_id))
}

/// Descending points-per-million; ties by descending predicted points.
pub fn by_value(a: &Candidate, b: &Candidate) -> Ordering {
    b.value()
        .total_cmp(&a.value())
        .then_with(|| b.predicted_points.total_cmp(&a.predicted_points))
}

pub fn rank(bucket: &[Candidate], strategy: Strategy) -> Vec<Candidate> {
    let mut ordered = bucket.to_vec();
    match strategy {
        Strategy::Points => ordered.sort_by(by_points),
        Strategy::Value => ordered.sort_by(by_value),
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{test_candidate, Position};

    #[test]
    fn points_ranking_is_descending() {
        let bucket = vec![
            test_candidate(1, Position::Mid, 1, 80, 4.0),
            test_candidate(2, Position::Mid, 1, 80, 6.0),
            test_candidate(3, Position::Mid, 1, 80, 5.0),
        ];
        let ranked = rank(&bucket, Strategy::Points);
        let ids: Vec<i64> = ranked.iter().map(|c| c.player_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn points_ties_break_on_cost_then_team_then_id() {
        let bucket = vec![
            test_candidate(1, Position::Mid, 2, 70, 5.0),
            test_candidate(2, Position::Mid, 2, 80, 5.0),
            test_candidate(3, Position::Mid, 9, 70, 5.0),
            test_candidate(4, Position::Mid, 9, 70, 5.0),
        ];
        let ranked = rank(&bucket, Strategy::Points);
        let ids: Vec<i64> = ranked.iter().map(|c| c.player_id).collect();
        // higher cost first, then higher team id, then higher player id
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }

    #[test]
    fn value_ranking_prefers_points_per_million() {
        // 6.0 / 4.0m = 1.5 beats 9.0 / 12.0m = 0.75
        let bucket = vec![
            test_candidate(1, Position::Fwd, 1, 120, 9.0),
            test_candidate(2, Position::Fwd, 2, 40, 6.0),
        ];
        let ranked = rank(&bucket, Strategy::Value);
        assert_eq!(ranked[0].player_id, 2);
    }

    #[test]
    fn value_ties_break_on_points() {
        // both 1.0 point per million, higher raw points first
        let bucket = vec![
            test_candidate(1, Position::Fwd, 1, 40, 4.0),
            test_candidate(2, Position::Fwd, 2, 80, 8.0),
        ];
        let ranked = rank(&bucket, Strategy::Value);
        assert_eq!(ranked[0].player_id, 2);
    }
}
