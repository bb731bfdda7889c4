use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Candidate, Position};
use crate::squad::{CandidatePool, BUDGET_EPSILON};

fn is_available(
    candidate: &Candidate,
    selected_ids: &BTreeSet<i64>,
    team_counts: &BTreeMap<i64, usize>,
    max_per_team: usize,
) -> bool {
    if selected_ids.contains(&candidate.player_id) {
        return false;
    }
    team_counts.get(&candidate.team_id).copied().unwrap_or(0) < max_per_team
}

/// Sum of the k cheapest still-available candidates in a bucket, or None if
/// fewer than k remain.
fn sum_cheapest(
    bucket: &[Candidate],
    k: usize,
    selected_ids: &BTreeSet<i64>,
    team_counts: &BTreeMap<i64, usize>,
    max_per_team: usize,
) -> Option<f64> {
    if k == 0 {
        return Some(0.0);
    }
    let mut costs: Vec<f64> = bucket
        .iter()
        .filter(|c| is_available(c, selected_ids, team_counts, max_per_team))
        .map(Candidate::cost)
        .collect();
    if costs.len() < k {
        return None;
    }
    costs.sort_by(f64::total_cmp);
    Some(costs[..k].iter().sum())
}

/// Admissibility check for a partial selection: can the remaining quota
/// still be covered within the remaining budget and team caps?
///
/// Two necessary conditions, both required:
/// 1. each open position still has enough available candidates;
/// 2. the sum of the cheapest-available picks per position fits the
///    remaining budget.
///
/// The lower bound assumes the cheapest per-position picks are
/// simultaneously reachable, ignoring cross-position team-cap interaction,
/// so a true result does not guarantee the greedy walk completes. A false
/// result proves no completion exists.
pub fn can_complete(
    remaining_budget_m: f64,
    remaining_needed: &BTreeMap<Position, usize>,
    pool: &CandidatePool,
    selected_ids: &BTreeSet<i64>,
    team_counts: &BTreeMap<i64, usize>,
    max_per_team: usize,
) -> bool {
    for (&position, &need) in remaining_needed {
        if need == 0 {
            continue;
        }
        let available = pool
            .bucket(position)
            .iter()
            .filter(|c| is_available(c, selected_ids, team_counts, max_per_team))
            .count();
        if available < need {
            return false;
        }
    }

    let mut min_possible = 0.0;
    for (&position, &need) in remaining_needed {
        if need == 0 {
            continue;
        }
        match sum_cheapest(
            pool.bucket(position),
            need,
            selected_ids,
            team_counts,
            max_per_team,
        ) {
            Some(sum) => min_possible += sum,
            None => return false,
        }
    }

    min_possible <= remaining_budget_m + BUDGET_EPSILON
}
