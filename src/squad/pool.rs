use std::collections::BTreeMap;

use crate::domain::{Candidate, Position, StatusFilter};
use crate::squad::{NeedHave, PositionCounts, SquadRequest, BUDGET_EPSILON};

/// Pure predicate conjunction over candidates. Every field is optional;
/// an empty filter keeps everything.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub status: StatusFilter,
    pub position: Option<Position>,
    pub team_id: Option<i64>,
    pub max_cost_m: Option<f64>,
    pub min_predicted_points: Option<f64>,
    pub name_contains: Option<String>,
}

impl CandidateFilter {
    pub fn from_request(request: &SquadRequest) -> Self {
        Self {
            status: request.status,
            position: None,
            team_id: None,
            max_cost_m: request.max_cost,
            min_predicted_points: request.min_predicted_points,
            name_contains: None,
        }
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        if !self.status.accepts(&candidate.status) {
            return false;
        }
        if let Some(position) = self.position {
            if candidate.position != position {
                return false;
            }
        }
        if let Some(team_id) = self.team_id {
            if candidate.team_id != team_id {
                return false;
            }
        }
        if let Some(max_cost) = self.max_cost_m {
            if candidate.cost() > max_cost + BUDGET_EPSILON {
                return false;
            }
        }
        if let Some(min_points) = self.min_predicted_points {
            if candidate.predicted_points < min_points {
                return false;
            }
        }
        if let Some(fragment) = &self.name_contains {
            let fragment = fragment.to_lowercase();
            if !candidate.web_name.to_lowercase().contains(&fragment) {
                return false;
            }
        }
        true
    }
}

/// Candidates bucketed per position. Buckets are unsorted; ranking happens
/// at selection time.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    buckets: BTreeMap<Position, Vec<Candidate>>,
}

impl CandidatePool {
    pub fn build(candidates: Vec<Candidate>, filter: &CandidateFilter) -> Self {
        let mut buckets: BTreeMap<Position, Vec<Candidate>> =
            Position::ALL.iter().map(|&p| (p, Vec::new())).collect();
        for candidate in candidates {
            if !filter.matches(&candidate) {
                continue;
            }
            if let Some(bucket) = buckets.get_mut(&candidate.position) {
                bucket.push(candidate);
            }
        }
        Self { buckets }
    }

    pub fn bucket(&self, position: Position) -> &[Candidate] {
        self.buckets
            .get(&position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn counts(&self) -> BTreeMap<Position, usize> {
        self.buckets
            .iter()
            .map(|(&position, bucket)| (position, bucket.len()))
            .collect()
    }

    /// Positions whose raw bucket size cannot cover the quota, before any
    /// budget or team-cap pressure. An empty map means the quick check
    /// passes.
    pub fn missing_for(&self, quota: &PositionCounts) -> BTreeMap<Position, NeedHave> {
        let mut missing = BTreeMap::new();
        for position in Position::ALL {
            let need = quota.get(position);
            let have = self.bucket(position).len();
            if have < need {
                missing.insert(position, NeedHave { need, have });
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_candidate;

    #[test]
    fn buckets_by_position() {
        let candidates = vec![
            test_candidate(1, Position::Gkp, 1, 45, 3.0),
            test_candidate(2, Position::Def, 1, 50, 4.0),
            test_candidate(3, Position::Def, 2, 55, 4.5),
        ];
        let pool = CandidatePool::build(candidates, &CandidateFilter::default());
        assert_eq!(pool.bucket(Position::Gkp).len(), 1);
        assert_eq!(pool.bucket(Position::Def).len(), 2);
        assert!(pool.bucket(Position::Fwd).is_empty());
    }

    #[test]
    fn filter_is_a_conjunction() {
        let mut injured = test_candidate(1, Position::Mid, 1, 80, 6.0);
        injured.status = "i".to_string();
        let pricey = test_candidate(2, Position::Mid, 1, 130, 9.0);
        let weak = test_candidate(3, Position::Mid, 1, 50, 1.0);
        let keeper = test_candidate(4, Position::Mid, 1, 75, 5.5);

        let filter = CandidateFilter {
            status: StatusFilter::Available,
            max_cost_m: Some(10.0),
            min_predicted_points: Some(2.0),
            ..CandidateFilter::default()
        };
        let pool = CandidatePool::build(vec![injured, pricey, weak, keeper], &filter);
        let bucket = pool.bucket(Position::Mid);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].player_id, 4);
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        let candidate = test_candidate(9, Position::Fwd, 2, 90, 7.0);
        let filter = CandidateFilter {
            name_contains: Some("PLAYER9".to_string()),
            ..CandidateFilter::default()
        };
        assert!(filter.matches(&candidate));
        let filter = CandidateFilter {
            name_contains: Some("nomatch".to_string()),
            ..CandidateFilter::default()
        };
        assert!(!filter.matches(&candidate));
    }

    #[test]
    fn missing_positions_report_need_and_have() {
        let candidates = vec![
            test_candidate(1, Position::Gkp, 1, 45, 3.0),
            test_candidate(2, Position::Gkp, 2, 45, 3.0),
        ];
        let pool = CandidatePool::build(candidates, &CandidateFilter::default());
        let missing = pool.missing_for(&PositionCounts::squad_default());
        assert!(!missing.contains_key(&Position::Gkp));
        let def = missing.get(&Position::Def).unwrap();
        assert_eq!(def.need, 5);
        assert_eq!(def.have, 0);
    }
}
